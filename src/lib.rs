//! qcwatch - Cliente de control de calidad de datos
//!
//! qcwatch lanza tareas de control de calidad (QC) contra el backend de
//! gobernanza de datos y sigue su progreso en tiempo real a través de
//! Server-Sent Events.
//!
//! # Arquitectura
//!
//! - **SSE con reconexión acotada**: conexión por streaming con un número
//!   máximo de reintentos y un intervalo fijo entre ellos
//! - **Almacén de ejecuciones**: historial de mensajes por tarea, compartido
//!   entre la conexión y la vista
//! - **Reconciliador de pasos**: convierte el historial de mensajes en el
//!   estado de cada paso del pipeline
//! - **Administración**: usuarios, roles, diccionarios y categorías
//!
//! # Módulos Principales
//!
//! - [`sse`] - Parser de eventos, máquina de estados y cliente de conexión
//! - [`execution`] - Almacén de ejecuciones y seguimiento de tareas
//! - [`progress`] - Mensajes de progreso y reconciliación de pasos
//! - [`qc`] - Categorías de QC, formularios de lanzamiento y resultados
//! - [`api`] - Cliente REST con el sobre `{ code, msg, data }`
//! - [`auth`] - Almacenamiento de tokens y guardia de rutas
//!
//! # Ejemplo de Uso
//!
//! ```rust,no_run
//! use qcwatch::{
//!     api::ApiClient, config::AppConfig, execution::ExecutionStore,
//!     qc::{QcCategory, QcLaunchRequest, QcLauncher}, sse::HttpTransport,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = AppConfig::load(None)?;
//! let api = ApiClient::new(&config.api.base_url, config.api.request_timeout_secs)?;
//! let transport = Arc::new(HttpTransport::new(config.api.connect_timeout())?);
//! let launcher = QcLauncher::new(api, transport, ExecutionStore::shared(), &config);
//!
//! let request = QcLaunchRequest::new("ds-1").with_tables(["patient_visit"]);
//! let mut task = launcher.launch(QcCategory::Flow, &request).await?;
//! while let Some(event) = task.events.recv().await {
//!     println!("{:?}", event);
//! }
//! # Ok(())
//! # }
//! ```

pub mod admin;
pub mod api;
pub mod auth;
pub mod config;
pub mod execution;
pub mod logging;
pub mod progress;
pub mod qc;
pub mod sse;

pub use admin::InMemoryAdminRepository;
pub use api::ApiClient;
pub use config::AppConfig;
pub use execution::{ExecutionStore, ExecutionTracker, SharedStore, TrackerEvent};
pub use progress::{reconcile, ProgressMessage, Reconciliation, StepStatus};
pub use qc::{QcCategory, QcLaunchRequest, QcLauncher};
pub use sse::{create_sse, SseHandle, SseHandler};
