//! Live-reload messages and the hub that broadcasts them.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use trowel_pipelines::{Notifier, Task};

/// Messages pushed to connected browsers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReloadMessage {
    /// Connection established
    Connected,

    /// Full page reload
    Reload,

    /// Re-fetch stylesheets without reloading the page
    Css,

    /// A pipeline failed to transform a file
    Error {
        /// Task that reported the failure
        task: String,
        /// Failure description
        message: String,
    },
}

/// Hub for broadcasting reload messages to all connected clients.
#[derive(Debug, Clone)]
pub struct ReloadHub {
    sender: broadcast::Sender<ReloadMessage>,
}

impl ReloadHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    /// Send a message to all connected clients.
    pub fn send(&self, msg: ReloadMessage) {
        // No receivers just means no browser is open
        let _ = self.sender.send(msg);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadMessage> {
        self.sender.subscribe()
    }

    /// Get the number of connected clients.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Notifier that logs a failure and shows it in every connected browser.
#[derive(Debug, Clone)]
pub struct HubNotifier {
    hub: ReloadHub,
}

impl HubNotifier {
    pub fn new(hub: ReloadHub) -> Self {
        Self { hub }
    }
}

impl Notifier for HubNotifier {
    fn transform_failed(&self, task: Task, message: &str) {
        tracing::error!("Error {}: {}", task, message);
        self.hub.send(ReloadMessage::Error {
            task: task.to_string(),
            message: message.to_string(),
        });
    }
}

/// Generate the browser side of live reload.
///
/// The socket address is derived from the page location, so the script works
/// on whatever host and port the server was bound to.
pub fn client_script(socket_path: &str) -> String {
    format!(
        r#"
(function() {{
  'use strict';

  const scheme = location.protocol === 'https:' ? 'wss://' : 'ws://';
  const ws = new WebSocket(scheme + location.host + '{}');
  const overlayId = '__trowel-error';

  function showError(task, message) {{
    let overlay = document.getElementById(overlayId);
    if (!overlay) {{
      overlay = document.createElement('pre');
      overlay.id = overlayId;
      overlay.style.cssText = 'position:fixed;inset:0;z-index:2147483647;margin:0;' +
        'padding:2rem;overflow:auto;background:rgba(20,20,20,.92);color:#ff6b6b;' +
        'font:14px/1.5 ui-monospace,monospace;white-space:pre-wrap;';
      overlay.addEventListener('click', function() {{ overlay.remove(); }});
      document.body.appendChild(overlay);
    }}
    overlay.textContent = 'Error ' + task + ': ' + message;
  }}

  function clearError() {{
    const overlay = document.getElementById(overlayId);
    if (overlay) {{
      overlay.remove();
    }}
  }}

  function refreshStyles() {{
    const stamp = Date.now();
    document.querySelectorAll('link[rel="stylesheet"]').forEach(function(link) {{
      const url = new URL(link.href);
      if (url.host !== location.host) {{
        return;
      }}
      url.searchParams.set('__trowel', stamp);
      const next = link.cloneNode();
      next.href = url.toString();
      next.addEventListener('load', function() {{ link.remove(); }});
      link.after(next);
    }});
  }}

  ws.onmessage = function(event) {{
    const msg = JSON.parse(event.data);

    switch (msg.type) {{
      case 'reload':
        location.reload();
        break;

      case 'css':
        clearError();
        refreshStyles();
        break;

      case 'error':
        showError(msg.task, msg.message);
        break;

      case 'connected':
        console.log('[trowel] Live reload connected');
        break;
    }}
  }};

  ws.onclose = function() {{
    console.log('[trowel] Disconnected, retrying');
    setTimeout(function() {{ location.reload(); }}, 1000);
  }};
}})();
"#,
        socket_path
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn hub_broadcasts_messages() {
        let hub = ReloadHub::new();
        let mut rx = hub.subscribe();

        hub.send(ReloadMessage::Css);

        match rx.try_recv() {
            Ok(ReloadMessage::Css) => {}
            other => panic!("Expected Css message, got {:?}", other),
        }
    }

    #[test]
    fn sending_without_clients_is_fine() {
        let hub = ReloadHub::new();
        assert_eq!(hub.subscriber_count(), 0);
        hub.send(ReloadMessage::Reload);
    }

    #[test]
    fn serializes_messages() {
        assert_eq!(
            serde_json::to_string(&ReloadMessage::Reload).unwrap(),
            r#"{"type":"reload"}"#
        );

        let msg = ReloadMessage::Error {
            task: "styles".to_string(),
            message: "expected \";\"".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();

        assert!(json.contains(r#""type":"error""#));
        assert!(json.contains(r#""task":"styles""#));
        assert_eq!(serde_json::from_str::<ReloadMessage>(&json).unwrap(), msg);
    }

    #[test]
    fn notifier_forwards_failures_to_clients() {
        let hub = ReloadHub::new();
        let mut rx = hub.subscribe();

        HubNotifier::new(hub.clone()).transform_failed(Task::Pages, "missing header");

        assert_eq!(
            rx.try_recv().unwrap(),
            ReloadMessage::Error {
                task: "pages".to_string(),
                message: "missing header".to_string(),
            }
        );
    }

    #[test]
    fn client_script_targets_socket_path() {
        let script = client_script("/__livereload");
        assert!(script.contains("location.host + '/__livereload'"));
        assert!(script.contains("case 'css':\n        clearError();\n        refreshStyles();"));
        assert!(script.contains("getElementById(overlayId)"));
    }
}
