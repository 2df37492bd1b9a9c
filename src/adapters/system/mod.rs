pub mod clock;
pub mod procfs_probe;
