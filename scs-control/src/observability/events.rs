//! Canonical structured event names used across `scs-control`.

// Session exchange events.
pub const EXCHANGE_START: &str = "exchange_start";
pub const EXCHANGE_NO_WAIT: &str = "exchange_no_wait";
pub const EXCHANGE_VALID: &str = "exchange_valid";
pub const EXCHANGE_INVALID: &str = "exchange_invalid";
pub const EXCHANGE_TIMED_OUT: &str = "exchange_timed_out";
pub const SESSION_CONNECT_OK: &str = "session_connect_ok";
pub const SESSION_CONNECT_FAILED: &str = "session_connect_failed";
pub const SESSION_CLOSE: &str = "session_close";
pub const SESSION_INPUT_CLOSED: &str = "session_input_closed";
pub const SESSION_EXCHANGE_REPORTED: &str = "session_exchange_reported";

// Publish path events.
pub const PUBLISH_ATTEMPT: &str = "publish_attempt";
pub const PUBLISH_OK: &str = "publish_ok";
pub const PUBLISH_FAILED: &str = "publish_failed";
pub const PUBLISH_RETRY_SCHEDULED: &str = "publish_retry_scheduled";
pub const PUBLISH_RETRIES_EXHAUSTED: &str = "publish_retries_exhausted";

// Correlation events.
pub const CORRELATOR_REGISTER: &str = "correlator_register";
pub const RECEIPT_MATCHED: &str = "receipt_matched";
pub const RECEIPT_DUPLICATE_IGNORED: &str = "receipt_duplicate_ignored";
pub const RECEIPT_UNRELATED_IGNORED: &str = "receipt_unrelated_ignored";
pub const RECEIPT_NOTHING_PENDING: &str = "receipt_nothing_pending";
pub const MESSAGE_UNDECODABLE_DROPPED: &str = "message_undecodable_dropped";

// Device-side responder events.
pub const RESPONDER_DATUM_RECEIVED: &str = "responder_datum_received";
pub const RESPONDER_OTHER_DEVICE_IGNORED: &str = "responder_other_device_ignored";
pub const RESPONDER_AUTH_FAILED: &str = "responder_auth_failed";
pub const RESPONDER_DUPLICATE_REPLAYED: &str = "responder_duplicate_replayed";
pub const RESPONDER_EXECUTED: &str = "responder_executed";
pub const RESPONDER_PUBLISH_FAILED: &str = "responder_publish_failed";

// Bus adapter events.
pub const BUS_SUBSCRIBE: &str = "bus_subscribe";
pub const BUS_DELIVER: &str = "bus_deliver";
pub const BUS_FRAME_DROPPED: &str = "bus_frame_dropped";
pub const BUS_READER_CLOSED: &str = "bus_reader_closed";
pub const BUS_BRIDGE_SPAWN_OK: &str = "bus_bridge_spawn_ok";
pub const BUS_DISCONNECT: &str = "bus_disconnect";
