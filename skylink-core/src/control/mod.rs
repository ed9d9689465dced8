//! Control channel: client stick state → server output device.
//!
//! ```text
//! CLIENT                                   SERVER
//! ┌──────────────────┐                    ┌────────────────────┐
//! │ SessionState     │                    │ ControlReceiver    │
//! │   ↓ (per tick)   │  UDP, 16 bytes     │   ↓ decode + clamp │
//! │ ControlSender    │ ─────────────────► │ OutputDevice       │
//! └──────────────────┘                    └────────────────────┘
//! ```
//!
//! | Module     | Purpose                                        |
//! |------------|------------------------------------------------|
//! | `codec`    | Fixed 16-byte little-endian packet framing     |
//! | `sender`   | Periodic fire-and-forget sender (client)       |
//! | `receiver` | Non-blocking poll loop driving a device (server) |

pub mod codec;
pub mod receiver;
pub mod sender;

pub use codec::{CONTROL_PACKET_SIZE, ControlCodec};
pub use receiver::{ControlDiagnostics, ControlReceiver, ControlReceiverConfig};
pub use sender::{ControlSender, ControlSenderConfig, SenderStats};
