//! Odds feed endpoint monitor
//!
//! 上流データソース（オッズAPI）のエンドポイント一覧を健全に保つ監視ライブラリ。
//! HEADによる変更検知、条件付きGET、ペイロード検証、サーキットブレーカー、
//! レート制限、原子的な永続化を組み合わせる。

#![warn(missing_docs)]

/// 共通エラー型
pub mod common;

/// 設定管理（環境変数）
pub mod config;

/// 型定義
pub mod types;

/// サーキットブレーカー・レート制限
pub mod guard;

/// ペイロード検証
pub mod validation;

/// 設定・状態キャッシュの永続化
pub mod store;

/// 上流HTTPアクセス（プローブ・条件付きGET）
pub mod http;

/// 候補エンドポイントの発見
pub mod discovery;

/// 監視オーケストレータと定期ループ
pub mod monitor;

/// 単一インスタンスロック
pub mod lock;

/// グレースフルシャットダウン
pub mod shutdown;

/// ロギング初期化ユーティリティ
pub mod logging;

/// CLI
pub mod cli;

pub use common::{MonitorError, StoreError};
pub use monitor::{EndpointMonitor, MonitorContext};
