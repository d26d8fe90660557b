//! Static diagnostic fallback.

/// The backend of last resort.
///
/// Used when the module bundle is missing or a stub, or when loading
/// failed. Always answers with a fixed diagnostic message embedding the
/// captured reason and, when available, sidecar diagnostics from the
/// build pipeline. Never errors.
pub struct StaticFallback {
    reason: String,
    sidecar: Option<String>,
}

impl StaticFallback {
    pub fn new(reason: impl Into<String>) -> Self {
        let mut reason = reason.into();
        if reason.trim().is_empty() {
            reason = "no failure details were captured".to_string();
        }
        Self {
            reason,
            sidecar: None,
        }
    }

    pub fn with_sidecar(mut self, sidecar: impl Into<String>) -> Self {
        self.sidecar = Some(sidecar.into());
        self
    }

    /// The captured failure reason.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn answer(&self) -> String {
        let mut answer = format!(
            "The response kernel is unavailable: {}. Answers cannot be generated \
             until the kernel bundle is rebuilt and the application is reloaded. \
             Operators: rebuild the module bundle, verify it is served with the \
             application assets, then reload.",
            self.reason
        );
        if let Some(sidecar) = &self.sidecar {
            answer.push_str("\n\nBuild diagnostics:\n");
            answer.push_str(sidecar);
        }
        answer
    }
}
