//! Bridges Breakpoint Manager observer events to MCP-style notifications,
//! the way `cideldill_server.mcp_notifications.MCPNotificationDispatcher`
//! turns `execution_paused`/`execution_resumed`/`call_completed` into
//! `notifications/breakpoint/<event>` messages.
//!
//! `--mcp`/`--mcp-sse` only ask for these notifications to be observable;
//! they do not stand up a full MCP transport (stdio JSON-RPC framing or an
//! SSE endpoint) here. Both flags currently wire the same sink, which logs
//! each notification as a structured `tracing` event — a real MCP server
//! would subscribe a transport-specific sink in its place.

use cideldill_types::Event;

fn notification_name(event: &Event) -> &'static str {
    match event {
        Event::ExecutionPaused(_) => "notifications/breakpoint/execution_paused",
        Event::ExecutionResumed { .. } => "notifications/breakpoint/execution_resumed",
        Event::CallCompleted(_) => "notifications/breakpoint/call_completed",
        Event::PickleError { .. } => "notifications/breakpoint/pickle_error",
    }
}

pub fn mcp_notification_sink(event: Event) {
    let method = notification_name(&event);
    match &event {
        Event::ExecutionPaused(paused) => {
            tracing::info!(method, pause_id = %paused.pause_id, method_name = %paused.call_data.method_name, "mcp notification");
        }
        Event::ExecutionResumed { pause_id } => {
            tracing::info!(method, pause_id = %pause_id, "mcp notification");
        }
        Event::CallCompleted(record) => {
            tracing::info!(method, call_id = %record.call_id, method_name = %record.method_name, "mcp notification");
        }
        Event::PickleError { method_name, type_name, pickle_error } => {
            tracing::info!(method, method_name, type_name, pickle_error, "mcp notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_names_match_the_breakpoint_event_family() {
        assert_eq!(notification_name(&Event::ExecutionResumed { pause_id: uuid::Uuid::nil() }), "notifications/breakpoint/execution_resumed");
    }
}
