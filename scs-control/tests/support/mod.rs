use integration_test_utils::{CONTROL_TOPIC, DEVICE_SECRET, DEVICE_TAG, HOST_TAG};
use scs_control::{ControlSession, MessageBus, SessionConfig, SessionTarget, SharedSecret};
use std::sync::Arc;
use std::time::Duration;

pub(crate) type BufferedSession = ControlSession<Vec<u8>, Vec<u8>>;

pub(crate) fn secret() -> SharedSecret {
    SharedSecret::new(DEVICE_SECRET)
}

pub(crate) fn session_config(timeout: Duration) -> SessionConfig {
    let mut config = SessionConfig::new(
        HOST_TAG,
        SessionTarget::new(DEVICE_TAG, CONTROL_TOPIC, secret()),
    );
    config.timeout = timeout;
    config
}

pub(crate) async fn connect(bus: Arc<dyn MessageBus>, config: SessionConfig) -> BufferedSession {
    ControlSession::connect(bus, config, Vec::new(), Vec::new())
        .await
        .expect("session should connect")
}

pub(crate) fn tokens(line: &str) -> Vec<String> {
    scs_control::tokenize(line)
}

#[allow(dead_code)]
pub(crate) async fn close_to_strings(session: BufferedSession) -> (String, String) {
    let (out, err) = session.close().await;
    (
        String::from_utf8(out).expect("stdout should be utf8"),
        String::from_utf8(err).expect("stderr should be utf8"),
    )
}
