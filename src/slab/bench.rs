//! Timing checks for the allocation paths
