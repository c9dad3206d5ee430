//! Editing tests - open a fixture, edit it, save it, inspect the archive.

mod formulas;
mod packages;
mod refusals;
mod round_trip;
