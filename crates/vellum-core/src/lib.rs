//! vellum-core
//!
//! Snapshot-and-recovery for a remote document workspace: capture a page
//! (properties plus its nested block tree) into a durable artifact before
//! destructive changes, keep artifacts under a retention policy, and restore
//! a page from any artifact.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, blocks, pages, artifacts, retention, errors）
//! - **ports**: 抽象化レイヤー（ContentGateway, ArtifactStore, Clock）
//! - **impls**: 実装（LocalArtifactStore, HttpGateway, InMemory 系）
//! - **app**: アプリケーションロジック（materializer, snapshot store, retention, restorer, guard, builder）
//! - **config**: TOML + 環境変数による設定

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;

pub use app::{BackupMode, BuildError, Vault, VaultBuilder};
pub use config::VaultConfig;
pub use domain::{ErrorKind, VaultError};
