//! Stockwatch: stock quote monitor and alert pipeline
//!
//! Watches one stock symbol, turns threshold crossings and new day records
//! into alerts, and fans every alert out to an ordered list of delivery
//! channels.
//!
//! # Features
//!
//! - **Two topologies**: separate monitor/alert tasks joined by a bounded
//!   queue, or a single loop that delivers inline
//! - **Backpressure**: a full queue blocks the monitor loop
//! - **Failure policy**: per strategy list, skip the failing strategy or
//!   abort the whole process
//! - **Quote sources**: random walk simulator, HTTP quote API, Kafka (`kafka`)
//! - **Delivery channels**: console, SMTP, webhook, Kafka (`kafka`)
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use stockwatch::app::AppConfig;
//! use stockwatch::params::Parameters;
//! use stockwatch::pipeline::{LifetimeHandle, Pipeline};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let params = Arc::new(Parameters::parse("PETR4", "34.50", "29.90")?);
//! let config = AppConfig::from_env()?;
//!
//! let pipeline = Pipeline::new(
//!     config.pipeline.clone(),
//!     config.build_monitors(params)?,
//!     config.build_channels()?,
//!     LifetimeHandle::new(),
//! )?;
//! let report = pipeline.run().await?;
//! println!("Stopped: {:?}", report);
//! # Ok(())
//! # }
//! ```

pub mod alerts;
pub mod app;
pub mod config;
pub mod delivery;
pub mod error;
pub mod monitor;
pub mod params;
pub mod pipeline;
pub mod providers;
pub mod sim;

#[cfg(feature = "kafka")]
pub mod pubsub;

// Re-export commonly used types
pub use alerts::{Alert, AlertQueue, QueueError};
pub use app::{AppConfig, AppError};
pub use params::{Parameters, ParamsError};
pub use pipeline::{LifetimeHandle, Pipeline, PipelineConfig, PipelineReport, Topology};
