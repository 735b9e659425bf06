//! Conversational transport seam

use async_trait::async_trait;
use desk_core::Result;
use tracing::warn;

/// Speaks text to the caller
///
/// Implemented by the voice transport (TTS session, console, ...).
#[async_trait]
pub trait CallerVoice: Send + Sync {
    async fn say(&self, text: &str) -> Result<()>;
}

/// Fire-and-forget speech: transport failures are logged, never raised
pub(crate) async fn speak(voice: &dyn CallerVoice, text: &str) {
    if let Err(e) = voice.say(text).await {
        warn!("Failed to speak to caller: {}", e);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Records every spoken line
    #[derive(Default)]
    pub struct RecordingVoice {
        lines: Mutex<Vec<String>>,
        fail: bool,
    }

    impl RecordingVoice {
        pub fn failing() -> Self {
            Self {
                lines: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        pub fn lines(&self) -> Vec<String> {
            self.lines.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CallerVoice for RecordingVoice {
        async fn say(&self, text: &str) -> Result<()> {
            self.lines.lock().unwrap().push(text.to_string());
            if self.fail {
                return Err(desk_core::Error::Other("speaker unplugged".to_string()));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingVoice;
    use super::*;

    #[test]
    fn test_speak_swallows_transport_errors() {
        let voice = RecordingVoice::failing();
        tokio_test::block_on(speak(&voice, "Hello"));
        assert_eq!(voice.lines(), vec!["Hello"]);
    }
}
