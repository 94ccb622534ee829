//! buildflux - CI build metrics publisher
//!
//! Turns a finished build (result, timings, test and coverage reports, SCM
//! data) into time-series points and writes them to InfluxDB servers
//! speaking either the v1 or the v2 HTTP API.
//!
//! # Architecture
//!
//! ```text
//! BuildContext ──► PointGenerators ──► Points ──► ClientWrapper ──► Targets
//!                                                   (v2 or v1)
//! ```
//!
//! Generators and Targets are both isolated: one failing never stops the
//! rest of the publication.

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

pub mod client;
pub mod config;
pub mod console;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod generate;
pub mod line_protocol;
pub mod metrics;
pub mod options;
pub mod point;
pub mod publish;
pub mod registry;
pub mod renderer;
pub mod store;
pub mod target;

pub use client::{ClientWrapper, HttpClient};
pub use config::Config;
pub use context::{BuildContext, BuildRecord};
pub use dispatch::GlobalListener;
pub use error::{PublishError, Result};
pub use line_protocol::LineProtocol;
pub use options::PublishOptions;
pub use point::{FieldValue, Point, PointBuilder, Precision};
pub use publish::{PublicationReport, PublicationService};
pub use registry::GeneratorRegistry;
pub use store::TargetStore;
pub use target::Target;
