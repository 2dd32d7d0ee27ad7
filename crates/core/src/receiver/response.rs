use crate::multipart::ser::build_response;
use crate::Result;

/// The answer sent back to the transport for one request
///
/// `status`, `error` and `response` end up in the text part of the reply as
/// `status=...&error=...&appdata=...`. The optional payload is sent as a second part
/// and is only written when it has a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseEnvelope {
    /// Overall outcome such as `success`, `aborted` or `abnormal`
    pub status: String,
    /// Short reason for a failure, `none` on success
    pub error: String,
    /// Application data returned to the sender
    pub response: String,
    /// Bytes returned alongside the text part
    pub payload: Option<Vec<u8>>,
    /// File name the payload is sent back as
    pub payload_name: Option<String>,
}

impl Default for ResponseEnvelope {
    fn default() -> Self {
        Self {
            status: "success".to_string(),
            error: "none".to_string(),
            response: "success".to_string(),
            payload: None,
            payload_name: None,
        }
    }
}

impl ResponseEnvelope {
    /// Replaces the text fields and drops any payload
    pub fn set<S: Into<String>, E: Into<String>, R: Into<String>>(
        &mut self,
        status: S,
        error: E,
        response: R,
    ) {
        self.status = status.into();
        self.error = error.into();
        self.response = response.into();
        self.payload = None;
        self.payload_name = None;
    }

    /// Attaches a named payload to the reply
    pub fn set_payload<T: Into<String>>(&mut self, name: T, data: Vec<u8>) {
        self.payload_name = Some(name.into());
        self.payload = Some(data);
    }

    /// True if nothing has gone wrong yet
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }

    /// Serializes the reply as a multipart message, header block included
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(build_response(
            &self.status,
            &self.error,
            &self.response,
            self.payload.as_deref(),
            self.payload_name.as_deref(),
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multipart::de::parse_stream;

    #[test]
    fn test_defaults() {
        let env = ResponseEnvelope::default();
        assert_eq!(
            (env.status.as_str(), env.error.as_str(), env.response.as_str()),
            ("success", "none", "success")
        );
        assert!(env.is_success());
        assert_eq!(env.payload, None);
    }

    #[test]
    fn test_set_drops_payload() {
        let mut env = ResponseEnvelope::default();
        env.set_payload("a.ack", b"ack".to_vec());
        env.set("aborted", "bad mime format", "failure");
        assert!(!env.is_success());
        assert_eq!(env.payload, None);
        assert_eq!(env.payload_name, None);
    }

    #[test]
    fn test_to_bytes() {
        let mut env = ResponseEnvelope::default();
        env.set("success", "none", "InsertSucceeded");
        env.set_payload("msg.hl7.ack", b"MSH|^~\\&\r".to_vec());
        let bytes = env.to_bytes().unwrap();

        let reply = parse_stream(&bytes).unwrap();
        assert_eq!(reply.argument("status"), Some("success"));
        assert_eq!(reply.argument("appdata"), Some("InsertSucceeded"));
        let attachment = reply.attachment.unwrap();
        assert_eq!(attachment.name, "msg.hl7.ack");
        assert_eq!(attachment.data, b"MSH|^~\\&\r");
    }
}
