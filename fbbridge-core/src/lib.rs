#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

//! Native client bridge for Firebird.
//!
//! Loads `fbclient` (or an embedded engine) at run time and exposes the
//! handle lifecycle of the classic ISC API: databases, transactions, DSQL
//! statements, blobs, events and the service manager.
//!
//! ```no_run
//! use fbbridge_core::{ConnectionProperties, DatabaseFactory, FactoryKind, ParameterBuffer};
//!
//! # fn main() -> Result<(), fbbridge_core::FbError> {
//! let properties = ConnectionProperties::new("employee")
//!     .with_server("localhost", 3050)
//!     .with_credentials("SYSDBA", "masterkey");
//! let db = DatabaseFactory::shared(FactoryKind::Client).connect(properties)?;
//! db.attach()?;
//! let tr = db.start_transaction(&ParameterBuffer::read_committed())?;
//! let mut stmt = db.create_statement(Some(&tr))?;
//! stmt.prepare("SELECT 1 FROM RDB$DATABASE")?;
//! stmt.execute(&[])?;
//! stmt.fetch_rows(10)?;
//! while let Some(row) = stmt.take_row() {
//!     println!("{row:?}");
//! }
//! stmt.close()?;
//! tr.commit()?;
//! db.detach()?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod coder;
pub mod config;
pub mod consts;
pub mod db;
pub mod encoding;
pub mod factory;
pub mod features;
pub mod ffi;
pub mod fields;
pub mod info;
pub mod loader;
pub mod marshal;
pub mod operation;
pub mod params;
pub mod status;
pub mod tracker;

mod error;
pub use error::*;

pub mod logger;

pub use client::FbClientApi;
pub use config::{AttachProperties, ConnectionProperties, ServiceProperties, WireCrypt};
pub use db::{
    Blob, Database, EventHandle, EventHandler, ExceptionListener, ExecuteResult, Service,
    Statement, Transaction,
};
pub use encoding::Encoding;
pub use factory::{DatabaseFactory, FactoryKind};
pub use features::{ClientFeature, ClientFeatures};
pub use operation::{CancelKind, Operation, OperationAware};
pub use params::ParameterBuffer;
