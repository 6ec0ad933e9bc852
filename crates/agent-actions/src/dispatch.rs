//! Envelope dispatch for the agent's action surface.
//!
//! The transport that carries messages between hub and agent is an
//! external collaborator; it routes `collect_large_file` envelopes here
//! and sends whatever this returns back to the hub.

use longhaul_protocol::{CollectLargeFileArgs, ErrorCode, Message, MessageType};
use tracing::debug;

/// Handles one `collect_large_file` request and produces the reply.
///
/// A request that carries no parsable arguments can never resolve a file,
/// so it is classified like an unresolvable path.
pub async fn handle_collect(msg: &Message) -> Message {
    if msg.msg_type != MessageType::CollectLargeFile {
        return msg.reply_error(
            ErrorCode::NotFound,
            format!("unexpected message type {:?}", msg.msg_type),
        );
    }

    let args: CollectLargeFileArgs = match msg.parse_payload() {
        Ok(Some(args)) => args,
        Ok(None) => {
            return msg.reply_error(ErrorCode::NotFound, "collect arguments missing");
        }
        Err(e) => {
            return msg.reply_error(ErrorCode::NotFound, format!("collect arguments malformed: {e}"));
        }
    };

    debug!(id = %msg.id, path = %args.path_spec, "dispatching collect action");

    match crate::execute(&args).await {
        Ok(result) => match msg.reply(MessageType::OperationResult, Some(&result)) {
            Ok(reply) => reply,
            Err(e) => msg.reply_error(ErrorCode::RemoteRejected, format!("encode result: {e}")),
        },
        Err(e) => msg.reply_error(e.code(), e.to_string()),
    }
}
