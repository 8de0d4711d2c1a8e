use tenantscope::auth::{DeviceCodeInfo, DeviceCodePrompt};

/// Shows device code instructions on stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrPrompt;

impl DeviceCodePrompt for StderrPrompt {
    fn prompt(&self, info: &DeviceCodeInfo) {
        eprintln!();
        eprintln!("{}", info.message);
        eprintln!("  URL:  {}", info.verification_uri);
        eprintln!("  Code: {}", info.user_code);
        eprintln!();
    }
}
