//! End-to-end frame scenarios

mod dynamic_frames;
mod pipelined_reads;
mod routing_frames;
