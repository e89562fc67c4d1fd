use std::sync::LazyLock;

use regex::Regex;
use zeroize::Zeroize;

/// External facts a validator may need beyond the form's own values.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationCtx {
    /// A cloud remote is already registered, so the repository field is moot.
    pub has_remote: bool,
}

pub type Validator<const N: usize> = fn(&ValidationCtx, &[String; N]) -> Option<String>;

/// One field of an ordered schema. A validator may read values of its own or
/// earlier fields only; `clears` lists later fields whose values are wiped
/// whenever `clears_on` matches the new value.
pub struct FieldSpec<const N: usize> {
    pub name: &'static str,
    pub default: &'static str,
    pub validate: Validator<N>,
    pub clears_on: fn(&str) -> bool,
    pub clears: &'static [usize],
}

fn never(_: &str) -> bool {
    false
}

/// Current values and per-field verdicts for one form.
///
/// Editing a field re-validates every field up to and including it; fields
/// past it keep whatever verdict they already had, so untouched fields are
/// never flagged early. `validate_all` replaces the whole verdict set and is
/// the gate for submission.
pub struct FormState<const N: usize> {
    schema: &'static [FieldSpec<N>; N],
    values: [String; N],
    errors: [Option<String>; N],
}

impl<const N: usize> FormState<N> {
    pub fn new(schema: &'static [FieldSpec<N>; N]) -> Self {
        Self {
            schema,
            values: std::array::from_fn(|i| schema[i].default.to_string()),
            errors: std::array::from_fn(|_| None),
        }
    }

    pub fn value(&self, idx: usize) -> &str {
        &self.values[idx]
    }

    pub fn values(&self) -> &[String; N] {
        &self.values
    }

    pub fn error(&self, idx: usize) -> Option<&str> {
        self.errors[idx].as_deref()
    }

    pub fn field_name(&self, idx: usize) -> &'static str {
        self.schema[idx].name
    }

    /// Replace a field's value, apply its declared cascade clears in the same
    /// update, and re-validate fields `0..=idx`. Verdicts past `idx` are
    /// carried over untouched.
    pub fn set_value(&mut self, idx: usize, value: String, ctx: &ValidationCtx) {
        let spec = &self.schema[idx];
        if (spec.clears_on)(&value) {
            for &dep in spec.clears {
                self.values[dep].clear();
            }
        }
        self.values[idx] = value;
        self.validate_up_to(idx, ctx);
    }

    pub fn push_char(&mut self, idx: usize, c: char, ctx: &ValidationCtx) {
        let mut value = self.values[idx].clone();
        value.push(c);
        self.set_value(idx, value, ctx);
    }

    pub fn pop_char(&mut self, idx: usize, ctx: &ValidationCtx) {
        let mut value = self.values[idx].clone();
        value.pop();
        self.set_value(idx, value, ctx);
    }

    /// Fresh verdicts for fields `0..=idx`; later verdicts preserved.
    pub fn validate_up_to(&mut self, idx: usize, ctx: &ValidationCtx) {
        for i in 0..=idx.min(N - 1) {
            self.errors[i] = (self.schema[i].validate)(ctx, &self.values);
        }
    }

    /// Validate every field and replace the entire verdict set. Returns true
    /// when the form is clean.
    pub fn validate_all(&mut self, ctx: &ValidationCtx) -> bool {
        for i in 0..N {
            self.errors[i] = (self.schema[i].validate)(ctx, &self.values);
        }
        !self.has_errors()
    }

    pub fn has_errors(&self) -> bool {
        self.errors.iter().any(Option::is_some)
    }

    pub fn reset(&mut self) {
        for i in 0..N {
            self.values[i] = self.schema[i].default.to_string();
            self.errors[i] = None;
        }
    }

    /// Reset the listed fields to their defaults without a validation pass;
    /// used when a submission dialog closes and the sensitive inputs must not
    /// linger on screen as errors.
    pub fn clear_fields(&mut self, idxs: &[usize]) {
        for &idx in idxs {
            self.values[idx] = self.schema[idx].default.to_string();
            self.errors[idx] = None;
        }
    }

    pub fn zeroize_values(&mut self) {
        for value in &mut self.values {
            value.zeroize();
        }
    }
}

// ---------------------------------------------------------------------------
// Secret form: app / desc / format / secrets / push-to-cloud / repo
// ---------------------------------------------------------------------------

pub const SECRET_FIELDS: usize = 6;

pub mod secret {
    pub const APP: usize = 0;
    pub const DESC: usize = 1;
    pub const FORMAT: usize = 2;
    pub const SECRETS: usize = 3;
    pub const PUSH: usize = 4;
    pub const REPO: usize = 5;
}

pub const FORMAT_OPTIONS: [&str; 4] = [".txt", ".yml", ".json", ".csv"];

static NAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^[a-zA-Z0-9-]+$").expect("valid pattern"));
static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("^[a-zA-Z0-9._-]+@[a-zA-Z0-9.-]+\\.[a-zA-Z]{2,}$").expect("valid pattern")
});
static SSH_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("^git@[a-zA-Z0-9.-]+\\.[a-zA-Z]{2,}:[a-zA-Z0-9_.-]+/[a-zA-Z0-9_.-]+(\\.git)?$")
        .expect("valid pattern")
});

fn validate_app(_: &ValidationCtx, values: &[String; SECRET_FIELDS]) -> Option<String> {
    let value = values[secret::APP].trim();
    if !NAME_CHARS.is_match(value) {
        return Some("App can only contain letters, numbers, and hyphens (a-z, A-Z, 0-9, -)".into());
    }
    let size = value.chars().count();
    if (2..=12).contains(&size) {
        None
    } else {
        Some("App must be 2-12 characters".into())
    }
}

fn validate_desc(_: &ValidationCtx, values: &[String; SECRET_FIELDS]) -> Option<String> {
    let value = values[secret::DESC].trim();
    if !NAME_CHARS.is_match(value) {
        return Some(
            "Description can only contain letters, numbers, and hyphens (a-z, A-Z, 0-9, -)".into(),
        );
    }
    let size = value.chars().count();
    if (2..=24).contains(&size) {
        None
    } else {
        Some("Description must be 2-24 characters".into())
    }
}

fn validate_secrets(_: &ValidationCtx, values: &[String; SECRET_FIELDS]) -> Option<String> {
    let size = values[secret::SECRETS].trim().chars().count();
    if (1..=1_000_000).contains(&size) {
        None
    } else {
        Some("Secrets must be 1-1,000,000 characters".into())
    }
}

fn validate_repo(ctx: &ValidationCtx, values: &[String; SECRET_FIELDS]) -> Option<String> {
    if !ctx.has_remote && values[secret::PUSH] == "yes" {
        let value = values[secret::REPO].trim();
        if !SSH_URL.is_match(value) {
            return Some("Please enter a valid ssh git repository URL".into());
        }
    }
    None
}

fn always_valid<const N: usize>(_: &ValidationCtx, _: &[String; N]) -> Option<String> {
    None
}

pub static SECRET_SCHEMA: [FieldSpec<SECRET_FIELDS>; SECRET_FIELDS] = [
    FieldSpec {
        name: "App",
        default: "",
        validate: validate_app,
        clears_on: never,
        clears: &[],
    },
    FieldSpec {
        name: "Description",
        default: "",
        validate: validate_desc,
        clears_on: never,
        clears: &[],
    },
    FieldSpec {
        name: "Format",
        default: ".txt",
        validate: always_valid::<SECRET_FIELDS>,
        clears_on: never,
        clears: &[],
    },
    FieldSpec {
        name: "Secrets",
        default: "",
        validate: validate_secrets,
        clears_on: never,
        clears: &[],
    },
    FieldSpec {
        name: "Push to cloud?",
        default: "no",
        validate: always_valid::<SECRET_FIELDS>,
        // Opting out of the cloud makes the repository field irrelevant.
        clears_on: |v| v == "no",
        clears: &[secret::REPO],
    },
    FieldSpec {
        name: "Repository",
        default: "",
        validate: validate_repo,
        clears_on: never,
        clears: &[],
    },
];

// ---------------------------------------------------------------------------
// Credentials panel: email / question / answer / confirm answer
// ---------------------------------------------------------------------------

pub const PANEL_FIELDS: usize = 4;

pub mod panel {
    pub const EMAIL: usize = 0;
    pub const QUESTION: usize = 1;
    pub const ANSWER: usize = 2;
    pub const CONFIRM: usize = 3;
}

fn validate_email(_: &ValidationCtx, values: &[String; PANEL_FIELDS]) -> Option<String> {
    if EMAIL_PATTERN.is_match(values[panel::EMAIL].trim()) {
        None
    } else {
        Some("Please enter a valid email address".into())
    }
}

fn validate_question(_: &ValidationCtx, values: &[String; PANEL_FIELDS]) -> Option<String> {
    if values[panel::QUESTION].trim().chars().count() >= 6 {
        None
    } else {
        Some("Question requires at least 6 characters".into())
    }
}

fn validate_answer(_: &ValidationCtx, values: &[String; PANEL_FIELDS]) -> Option<String> {
    if values[panel::ANSWER].trim().chars().count() >= 6 {
        None
    } else {
        Some("Answer requires at least 6 characters".into())
    }
}

fn validate_confirm(_: &ValidationCtx, values: &[String; PANEL_FIELDS]) -> Option<String> {
    if values[panel::CONFIRM].trim() == values[panel::ANSWER].trim() {
        None
    } else {
        Some("Confirm answer does not match".into())
    }
}

fn is_empty(v: &str) -> bool {
    v.is_empty()
}

pub static PANEL_SCHEMA: [FieldSpec<PANEL_FIELDS>; PANEL_FIELDS] = [
    FieldSpec {
        name: "GPG Email",
        default: "",
        validate: validate_email,
        clears_on: never,
        clears: &[],
    },
    FieldSpec {
        name: "Secret Question",
        default: "",
        validate: validate_question,
        // An answer is meaningless once its question is gone.
        clears_on: is_empty,
        clears: &[panel::ANSWER, panel::CONFIRM],
    },
    FieldSpec {
        name: "Answer",
        default: "",
        validate: validate_answer,
        clears_on: is_empty,
        clears: &[panel::CONFIRM],
    },
    FieldSpec {
        name: "Confirm Answer",
        default: "",
        validate: validate_confirm,
        clears_on: never,
        clears: &[],
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    fn secret_form() -> FormState<SECRET_FIELDS> {
        FormState::new(&SECRET_SCHEMA)
    }

    fn panel_form() -> FormState<PANEL_FIELDS> {
        FormState::new(&PANEL_SCHEMA)
    }

    #[test]
    fn defaults_start_clean() {
        let form = secret_form();
        assert_eq!(form.value(secret::FORMAT), ".txt");
        assert_eq!(form.value(secret::PUSH), "no");
        assert!(!form.has_errors());
    }

    #[test]
    fn editing_later_field_keeps_earlier_field_valid() {
        let ctx = ValidationCtx::default();
        let mut form = secret_form();
        form.set_value(secret::APP, "ab".into(), &ctx);
        assert_eq!(form.error(secret::APP), None);

        form.set_value(secret::DESC, "x".into(), &ctx);
        assert_eq!(form.error(secret::APP), None);
        assert_eq!(
            form.error(secret::DESC),
            Some("Description must be 2-24 characters")
        );
    }

    #[test]
    fn editing_earlier_field_preserves_later_verdict() {
        let ctx = ValidationCtx::default();
        let mut form = secret_form();
        form.set_value(secret::APP, "ab".into(), &ctx);
        form.set_value(secret::DESC, "x".into(), &ctx);

        // Shrinking the app must flag it without touching the desc verdict.
        form.set_value(secret::APP, "a".into(), &ctx);
        assert_eq!(form.error(secret::APP), Some("App must be 2-12 characters"));
        assert_eq!(
            form.error(secret::DESC),
            Some("Description must be 2-24 characters")
        );
    }

    #[test]
    fn unreached_fields_never_gain_errors_from_earlier_edits() {
        let ctx = ValidationCtx::default();
        let mut form = secret_form();
        form.set_value(secret::APP, "github".into(), &ctx);
        // Secrets is empty and invalid, but has not been reached.
        assert_eq!(form.error(secret::SECRETS), None);
        assert_eq!(form.error(secret::REPO), None);
    }

    #[test]
    fn validate_all_is_idempotent() {
        let ctx = ValidationCtx::default();
        let mut form = secret_form();
        form.set_value(secret::APP, "github".into(), &ctx);
        form.validate_all(&ctx);
        let first: Vec<Option<String>> = (0..SECRET_FIELDS)
            .map(|i| form.error(i).map(str::to_string))
            .collect();
        form.validate_all(&ctx);
        let second: Vec<Option<String>> = (0..SECRET_FIELDS)
            .map(|i| form.error(i).map(str::to_string))
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn validate_all_flags_everything_required() {
        let ctx = ValidationCtx::default();
        let mut form = secret_form();
        assert!(!form.validate_all(&ctx));
        assert!(form.error(secret::APP).is_some());
        assert!(form.error(secret::DESC).is_some());
        assert!(form.error(secret::SECRETS).is_some());
        // Push defaults to "no", so the repo stays unchecked.
        assert_eq!(form.error(secret::REPO), None);
    }

    #[test]
    fn repo_required_only_when_pushing_without_remote() {
        let mut ctx = ValidationCtx::default();
        let mut form = secret_form();
        form.set_value(secret::PUSH, "yes".into(), &ctx);
        form.set_value(secret::REPO, "not-a-url".into(), &ctx);
        assert_eq!(
            form.error(secret::REPO),
            Some("Please enter a valid ssh git repository URL")
        );

        form.set_value(secret::REPO, "git@host.example.com:user/repo.git".into(), &ctx);
        assert_eq!(form.error(secret::REPO), None);

        ctx.has_remote = true;
        form.set_value(secret::REPO, "garbage".into(), &ctx);
        assert_eq!(form.error(secret::REPO), None);
    }

    #[test]
    fn turning_push_off_clears_repo_value() {
        let ctx = ValidationCtx::default();
        let mut form = secret_form();
        form.set_value(secret::PUSH, "yes".into(), &ctx);
        form.set_value(secret::REPO, "git@host.example.com:user/repo.git".into(), &ctx);
        form.set_value(secret::PUSH, "no".into(), &ctx);
        assert_eq!(form.value(secret::REPO), "");
    }

    #[test]
    fn clearing_question_clears_both_answers() {
        let ctx = ValidationCtx::default();
        let mut form = panel_form();
        form.set_value(panel::QUESTION, "favorite dog?".into(), &ctx);
        form.set_value(panel::ANSWER, "rexrex".into(), &ctx);
        form.set_value(panel::CONFIRM, "rexrex".into(), &ctx);

        form.set_value(panel::QUESTION, String::new(), &ctx);
        assert_eq!(form.value(panel::ANSWER), "");
        assert_eq!(form.value(panel::CONFIRM), "");
    }

    #[test]
    fn clearing_answer_clears_confirm_only() {
        let ctx = ValidationCtx::default();
        let mut form = panel_form();
        form.set_value(panel::QUESTION, "favorite dog?".into(), &ctx);
        form.set_value(panel::ANSWER, "rexrex".into(), &ctx);
        form.set_value(panel::CONFIRM, "rexrex".into(), &ctx);

        form.set_value(panel::ANSWER, String::new(), &ctx);
        assert_eq!(form.value(panel::QUESTION), "favorite dog?");
        assert_eq!(form.value(panel::CONFIRM), "");
    }

    #[test]
    fn confirm_answer_must_match() {
        let ctx = ValidationCtx::default();
        let mut form = panel_form();
        form.set_value(panel::EMAIL, "dev@example.com".into(), &ctx);
        form.set_value(panel::QUESTION, "favorite dog?".into(), &ctx);
        form.set_value(panel::ANSWER, "rexrex".into(), &ctx);
        form.set_value(panel::CONFIRM, "rexrey".into(), &ctx);
        assert_eq!(
            form.error(panel::CONFIRM),
            Some("Confirm answer does not match")
        );
        form.set_value(panel::CONFIRM, "rexrex".into(), &ctx);
        assert!(form.validate_all(&ctx));
    }

    #[test]
    fn email_pattern_rejects_junk() {
        let ctx = ValidationCtx::default();
        let mut form = panel_form();
        for bad in ["plainaddress", "user@", "@host.com", "user@host"] {
            form.set_value(panel::EMAIL, bad.into(), &ctx);
            assert!(form.error(panel::EMAIL).is_some(), "accepted {bad:?}");
        }
        form.set_value(panel::EMAIL, "dev@example.com".into(), &ctx);
        assert_eq!(form.error(panel::EMAIL), None);
    }

    #[test]
    fn reset_restores_defaults_and_clears_verdicts() {
        let ctx = ValidationCtx::default();
        let mut form = secret_form();
        form.set_value(secret::APP, "!".into(), &ctx);
        assert!(form.has_errors());
        form.reset();
        assert!(!form.has_errors());
        assert_eq!(form.value(secret::APP), "");
        assert_eq!(form.value(secret::FORMAT), ".txt");
    }
}
