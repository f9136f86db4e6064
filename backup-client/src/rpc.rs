//! Inbound RPC boundary.
//!
//! The host application reaches the coordinator through method-name plus
//! JSON-arguments calls; the transport itself (method channel, socket,
//! whatever the host uses) stays outside this crate. Errors cross the
//! boundary as `{code, message, details}` so callers can branch on the
//! code without parsing messages.

use crate::coordinator::BackupCoordinator;
use crate::error::{BackupError, GENERIC_FAILURE_CODE};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    pub method: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: String,
    pub message: String,
    pub details: String,
}

pub type RpcResult = std::result::Result<Value, RpcError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackupArgs {
    paths: Vec<PathBuf>,
    node_id: String,
    // Wire casing is "backupID", not camelCase.
    #[serde(rename = "backupID")]
    backup_id: String,
    #[serde(default)]
    silent: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeArgs {
    node_id: String,
    #[serde(rename = "backupID")]
    backup_id: String,
    #[serde(default)]
    silent: bool,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ListArgs {
    #[serde(default)]
    silent: bool,
}

/// Dispatch one RPC call to the coordinator.
pub async fn handle_request(coordinator: &BackupCoordinator, request: RpcRequest) -> RpcResult {
    info!(method = %request.method, "rpc call");
    match request.method.as_str() {
        "signOut" => coordinator
            .sign_out()
            .await
            .map(|()| json!(true))
            .map_err(into_rpc_error),

        "backup" => {
            let args: BackupArgs = parse_args(request.args)?;
            coordinator
                .backup(&args.node_id, &args.backup_id, &args.paths, !args.silent)
                .await
                .map(|()| json!(true))
                .map_err(into_rpc_error)
        }

        "getAvailableBackups" => {
            let args: ListArgs = parse_args(request.args)?;
            coordinator
                .list_available(!args.silent)
                .await
                .map(|folders| {
                    let map: serde_json::Map<String, Value> = folders
                        .into_iter()
                        .map(|(node_id, folder)| (node_id, json!(folder.0)))
                        .collect();
                    Value::Object(map)
                })
                .map_err(into_rpc_error)
        }

        "restore" => {
            let args: NodeArgs = parse_args(request.args)?;
            coordinator
                .restore(&args.node_id, &args.backup_id, !args.silent)
                .await
                .map(|paths| json!(paths))
                .map_err(into_rpc_error)
        }

        "isSafeForBackupID" => {
            let args: NodeArgs = parse_args(request.args)?;
            coordinator
                .check_safe(&args.node_id, &args.backup_id, !args.silent)
                .await
                .map(|()| json!(true))
                .map_err(into_rpc_error)
        }

        other => Err(RpcError {
            code: GENERIC_FAILURE_CODE.to_string(),
            message: format!("unknown method: {other}"),
            details: String::new(),
        }),
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(args: Value) -> std::result::Result<T, RpcError> {
    // Absent args arrive as null; treat them as an empty object so calls
    // with only optional arguments need not send one.
    let args = if args.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        args
    };
    serde_json::from_value(args).map_err(|err| RpcError {
        code: GENERIC_FAILURE_CODE.to_string(),
        message: "malformed arguments".to_string(),
        details: err.to_string(),
    })
}

fn into_rpc_error(err: BackupError) -> RpcError {
    RpcError {
        code: err.code().to_string(),
        message: err.to_string(),
        details: format!("{err:?}"),
    }
}
