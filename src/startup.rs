use crate::backend::SecretBackend;
use crate::models::EnvironmentReport;

/// Process-wide facts loaded once at launch. Probes are best-effort: any
/// failing probe leaves its flag false and never blocks startup.
#[derive(Debug, Clone, Default)]
pub struct StartupState {
    /// Masked for display; the raw address never leaves the backend.
    pub email: String,
    pub has_email: bool,
    /// Full question text, shown inside the challenge dialog.
    pub question: String,
    pub has_question: bool,
    pub has_remote: bool,
    pub environment: EnvironmentReport,
}

impl StartupState {
    pub fn load(backend: &mut dyn SecretBackend) -> Self {
        let mut state = Self::default();
        if let Ok(email) = backend.stored_email() {
            state.email = mask_email(email.trim());
            state.has_email = true;
        }
        if let Ok(question) = backend.stored_question() {
            state.question = question.trim().to_string();
            state.has_question = true;
        }
        if let Ok(report) = backend.probe_environment() {
            state.environment = report;
        }
        if let Ok(exists) = backend.remote_exists() {
            state.has_remote = exists;
        }
        state
    }

    pub fn question_masked(&self) -> String {
        mask_question(&self.question)
    }

    /// Applied after a successful credential registration.
    pub fn record_registration(&mut self, email: &str, question: &str) {
        self.email = mask_email(email);
        self.has_email = true;
        self.question = question.to_string();
        self.has_question = true;
    }
}

pub fn mask_email(email: &str) -> String {
    let Some((local, domain)) = email.split_once('@') else {
        return email.to_string();
    };
    if local.is_empty() {
        return email.to_string();
    }
    let chars: Vec<char> = local.chars().collect();
    if chars.len() <= 3 {
        format!("{}***@{domain}", chars[0])
    } else {
        let head: String = chars[..2].iter().collect();
        let tail = chars[chars.len() - 1];
        format!("{head}***{tail}@{domain}")
    }
}

pub fn mask_question(question: &str) -> String {
    let chars: Vec<char> = question.chars().collect();
    if chars.len() <= 8 {
        question.to_string()
    } else {
        let head: String = chars[..8].iter().collect();
        format!("{head}...")
    }
}
