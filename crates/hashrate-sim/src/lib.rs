/*!
Simulator for proof-of-work block discovery under a majority/minority hashrate
split.

Each simulated miner (an *agent*) makes hash attempts at a fixed rate and
reports found blocks as newline-delimited JSON [events](event::Event). A
[controller](controller::Controller) launches one agent per hashrate share,
starts them together, and tallies their blocks, showing how a share of the
hashrate turns into a share of the blocks.
*/

pub mod agent;
pub mod config;
pub mod controller;
pub mod dashboard;
pub mod estimate;
pub mod event;
pub mod hash;
pub mod prelude;
pub mod simulator;
pub mod sink;
pub mod tally;
pub mod threshold;
