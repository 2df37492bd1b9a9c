pub mod dto;
pub mod metrics_service;
pub mod ports;
pub mod services;
