use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::models::{EnvironmentReport, NewRecord, RecordSummary};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Secrets {0} not found")]
    NotFound(String),
    #[error("{0}")]
    Operation(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// The opaque command interface to the encrypting store. The client never
/// interprets ciphertext or storage layout; it only decides when these
/// operations run and with which arguments.
pub trait SecretBackend {
    fn probe_environment(&mut self) -> BackendResult<EnvironmentReport>;
    fn stored_email(&mut self) -> BackendResult<String>;
    fn stored_question(&mut self) -> BackendResult<String>;
    fn remote_exists(&mut self) -> BackendResult<bool>;
    fn list_records(&mut self, search: &str) -> BackendResult<Vec<RecordSummary>>;
    fn add_record(&mut self, record: &NewRecord, answer: &str) -> BackendResult<()>;
    fn delete_record(&mut self, id: &str) -> BackendResult<()>;
    fn decrypt_record(&mut self, id: &str, answer: Option<&str>) -> BackendResult<String>;
    fn register_challenge(
        &mut self,
        email: &str,
        question: &str,
        answer: &str,
    ) -> BackendResult<()>;
    fn verify_challenge(&mut self, answer: &str) -> BackendResult<bool>;
    fn register_remote(&mut self, url: &str) -> BackendResult<()>;
}

/// Passphrase fed to the symmetric gpg layer.
pub fn answer_digest(answer: &str) -> String {
    hex::encode(Sha256::digest(answer.as_bytes()))
}

/// Stored verifier: digest of the digest, so the passphrase itself is never
/// written out.
pub fn answer_verifier(answer: &str) -> String {
    let first = Sha256::digest(answer.as_bytes());
    hex::encode(Sha256::digest(first))
}

const INDEX_FILE: &str = "000.gpg";
const EMAIL_FILE: &str = "email.gpg";
const QUESTION_FILE: &str = "question.gpg";
const ANSWER_FILE: &str = "answer.gpg";

/// Index rows are `NNN.app.desc.format`; app and desc are hyphen/alnum only,
/// so the dots are unambiguous.
pub fn parse_index_line(line: &str) -> Option<RecordSummary> {
    let mut parts = line.splitn(4, '.');
    let id = parts.next()?;
    let app = parts.next()?;
    let desc = parts.next()?;
    let format = parts.next()?;
    if id.is_empty() || app.is_empty() || desc.is_empty() || format.is_empty() {
        return None;
    }
    Some(RecordSummary {
        id: id.to_string(),
        app: app.to_string(),
        desc: desc.to_string(),
        format: format!(".{format}"),
    })
}

pub fn index_line(id: &str, app: &str, desc: &str, format: &str) -> String {
    format!("{id}.{app}.{desc}{format}")
}

/// Ids are zero-padded three-digit numbers assigned after the last line.
pub fn next_record_id(lines: &[String]) -> BackendResult<String> {
    let mut number = 1;
    if let Some(last) = lines.last() {
        if last.len() < 3 {
            return Err(BackendError::Operation(format!(
                "Corrupt index line: {last}"
            )));
        }
        number = last[..3]
            .parse::<u32>()
            .map_err(|e| BackendError::Operation(format!("Corrupt index line: {e}")))?
            + 1;
    }
    Ok(format!("{number:03}"))
}

const GPG_CANDIDATES: [&str; 7] = [
    "/opt/homebrew/bin/gpg",
    "/usr/local/bin/gpg",
    "/usr/bin/gpg",
    "/opt/local/bin/gpg",
    "/usr/local/MacGPG2/bin/gpg",
    "/usr/local/bin/gpg2",
    "gpg",
];

const GIT_CANDIDATES: [&str; 5] = [
    "/usr/bin/git",
    "/usr/local/bin/git",
    "/opt/homebrew/bin/git",
    "/opt/local/bin/git",
    "git",
];

fn find_executable(candidates: &[&str], name: &str) -> Option<String> {
    for path in candidates {
        if Path::new(path).exists() {
            return Some((*path).to_string());
        }
    }
    let output = Command::new("which").arg(name).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let first = stdout.lines().next()?.trim();
    if first.is_empty() {
        None
    } else {
        Some(first.to_string())
    }
}

fn run_checked(cmd: &mut Command, what: &str) -> BackendResult<Output> {
    let output = cmd
        .output()
        .map_err(|e| BackendError::Operation(format!("Failed to execute {what} command: {e}")))?;
    if !output.status.success() {
        return Err(BackendError::Operation(format!(
            "Error result for {what} command: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(output)
}

fn pipe_through(cmd: &mut Command, input: &[u8], what: &str) -> BackendResult<Output> {
    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| BackendError::Operation(format!("Failed to execute {what} command: {e}")))?;
    if let Some(stdin) = child.stdin.as_mut() {
        stdin
            .write_all(input)
            .map_err(|e| BackendError::Operation(format!("Failed to write to {what} command: {e}")))?;
    }
    let output = child
        .wait_with_output()
        .map_err(|e| BackendError::Operation(format!("Failed to wait for {what} command: {e}")))?;
    if !output.status.success() {
        return Err(BackendError::Operation(format!(
            "Error result for {what} command: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(output)
}

/// Store implementation that shells out to gpg for all cryptography and to
/// git for history and cloud sync. Executable paths are discovered once and
/// cached on the value.
pub struct GpgGitBackend {
    work_dir: PathBuf,
    gpg_path: Option<String>,
    git_path: Option<String>,
}

impl GpgGitBackend {
    pub fn new(work_dir: PathBuf) -> Self {
        Self {
            work_dir,
            gpg_path: None,
            git_path: None,
        }
    }

    /// Initialize the git history on first run. Skipped quietly when either
    /// tool is missing; the environment block dialog handles that case.
    pub fn init_workspace(&mut self) -> BackendResult<()> {
        let report = self.probe_environment()?;
        if !report.git || !report.gpg {
            return Ok(());
        }
        if !self.work_dir.join(".git").exists() {
            let git = self.git()?;
            run_checked(
                Command::new(&git).args(["init"]).current_dir(&self.work_dir),
                "git",
            )?;
            let _ = Command::new(&git)
                .args(["checkout", "-b", "main"])
                .current_dir(&self.work_dir)
                .output();
        }
        Ok(())
    }

    fn gpg(&mut self) -> BackendResult<String> {
        if let Some(path) = &self.gpg_path {
            return Ok(path.clone());
        }
        let path = find_executable(&GPG_CANDIDATES, "gpg")
            .ok_or_else(|| BackendError::Operation("GPG not found in system, please install it".into()))?;
        self.gpg_path = Some(path.clone());
        Ok(path)
    }

    fn git(&mut self) -> BackendResult<String> {
        if let Some(path) = &self.git_path {
            return Ok(path.clone());
        }
        let path = find_executable(&GIT_CANDIDATES, "git")
            .ok_or_else(|| BackendError::Operation("Git not found in system, please install it".into()))?;
        self.git_path = Some(path.clone());
        Ok(path)
    }

    fn file(&self, name: &str) -> PathBuf {
        self.work_dir.join(name)
    }

    fn decrypt_file(&mut self, name: &str) -> BackendResult<String> {
        let gpg = self.gpg()?;
        let output = run_checked(
            Command::new(&gpg)
                .args(["--quiet", "--decrypt"])
                .arg(self.file(name))
                .current_dir(&self.work_dir),
            "gpg",
        )?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn encrypt_to(&mut self, recipient: &str, message: &str, name: &str) -> BackendResult<()> {
        let target = self.file(name);
        if let Err(e) = std::fs::remove_file(&target) {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(BackendError::Operation(format!(
                    "Failed to replace {name}: {e}"
                )));
            }
        }
        let gpg = self.gpg()?;
        pipe_through(
            Command::new(&gpg)
                .args(["--encrypt", "--recipient", recipient, "--output"])
                .arg(&target)
                .current_dir(&self.work_dir),
            message.as_bytes(),
            "gpg",
        )?;
        Ok(())
    }

    /// Asymmetric layer to the registered key, then a symmetric layer keyed on
    /// the answer digest, so revealing requires both the key and the answer.
    fn encrypt_with_answer(
        &mut self,
        recipient: &str,
        message: &str,
        answer: &str,
        name: &str,
    ) -> BackendResult<()> {
        let target = self.file(name);
        if let Err(e) = std::fs::remove_file(&target) {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(BackendError::Operation(format!(
                    "Failed to replace {name}: {e}"
                )));
            }
        }
        let gpg = self.gpg()?;
        let asymmetric = pipe_through(
            Command::new(&gpg)
                .args(["--encrypt", "--recipient", recipient])
                .current_dir(&self.work_dir),
            message.as_bytes(),
            "gpg",
        )?;
        let passphrase = answer_digest(answer);
        pipe_through(
            Command::new(&gpg)
                .args([
                    "--symmetric",
                    "--cipher-algo",
                    "AES256",
                    "--batch",
                    "--yes",
                    "--passphrase",
                    &passphrase,
                    "--output",
                ])
                .arg(&target)
                .current_dir(&self.work_dir),
            &asymmetric.stdout,
            "gpg",
        )?;
        Ok(())
    }

    fn index_lines(&mut self) -> BackendResult<Vec<String>> {
        if !self.file(INDEX_FILE).exists() {
            return Ok(Vec::new());
        }
        let data = self.decrypt_file(INDEX_FILE)?;
        Ok(data
            .split('\n')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn write_index(&mut self, lines: &[String]) -> BackendResult<()> {
        let email = self.stored_email()?;
        self.encrypt_to(&email, &lines.join("\n"), INDEX_FILE)
    }

    fn commit_all(&mut self, message: &str) -> BackendResult<()> {
        let git = self.git()?;
        run_checked(
            Command::new(&git)
                .args(["add", "./"])
                .current_dir(&self.work_dir),
            "git",
        )?;
        run_checked(
            Command::new(&git)
                .args(["commit", "-m", message])
                .current_dir(&self.work_dir),
            "git",
        )?;
        Ok(())
    }

    fn upstream_exists(&mut self) -> BackendResult<bool> {
        let git = self.git()?;
        let output = Command::new(&git)
            .args(["remote", "-vv"])
            .current_dir(&self.work_dir)
            .output()
            .map_err(|e| BackendError::Operation(format!("Failed to execute git command: {e}")))?;
        if output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            return Ok(stdout.lines().any(|line| line.contains("origin/main")));
        }
        Ok(false)
    }

    fn push_to_cloud(&mut self) -> BackendResult<()> {
        let git = self.git()?;
        let _ = Command::new(&git)
            .args(["pull", "--rebase"])
            .current_dir(&self.work_dir)
            .output();

        let args: &[&str] = if self.upstream_exists()? {
            &["push"]
        } else {
            &["push", "-u", "origin", "main"]
        };
        pipe_through(
            Command::new(&git).args(args).current_dir(&self.work_dir),
            b"yes\n",
            "git",
        )?;
        Ok(())
    }
}

impl SecretBackend for GpgGitBackend {
    fn probe_environment(&mut self) -> BackendResult<EnvironmentReport> {
        Ok(EnvironmentReport {
            git: find_executable(&GIT_CANDIDATES, "git").is_some(),
            gpg: find_executable(&GPG_CANDIDATES, "gpg").is_some(),
        })
    }

    fn stored_email(&mut self) -> BackendResult<String> {
        if !self.file(EMAIL_FILE).exists() {
            return Err(BackendError::Operation(
                "GPG email has not been set yet".into(),
            ));
        }
        self.decrypt_file(EMAIL_FILE)
    }

    fn stored_question(&mut self) -> BackendResult<String> {
        if !self.file(QUESTION_FILE).exists() {
            return Err(BackendError::Operation(
                "Secret question has not been set yet".into(),
            ));
        }
        self.decrypt_file(QUESTION_FILE)
    }

    fn remote_exists(&mut self) -> BackendResult<bool> {
        let git = self.git()?;
        let output = run_checked(
            Command::new(&git)
                .args(["remote", "-v"])
                .current_dir(&self.work_dir),
            "git",
        )?;
        Ok(!output.stdout.is_empty())
    }

    fn list_records(&mut self, search: &str) -> BackendResult<Vec<RecordSummary>> {
        let lines = self.index_lines()?;
        let mut items: Vec<RecordSummary> = lines
            .iter()
            .filter(|line| line.contains(search))
            .filter_map(|line| parse_index_line(line))
            .collect();
        items.reverse();
        Ok(items)
    }

    fn add_record(&mut self, record: &NewRecord, answer: &str) -> BackendResult<()> {
        let email = self.stored_email()?;
        let mut lines = self.index_lines()?;
        let id = next_record_id(&lines)?;
        lines.push(index_line(&id, &record.app, &record.desc, &record.format));
        self.write_index(&lines)?;
        self.encrypt_with_answer(&email, &record.payload, answer, &format!("{id}.gpg"))?;
        self.commit_all(&format!("add: {id}.gpg"))?;
        if record.push_to_cloud {
            self.push_to_cloud()?;
        }
        Ok(())
    }

    fn delete_record(&mut self, id: &str) -> BackendResult<()> {
        let lines = self.index_lines()?;
        let kept: Vec<String> = lines
            .iter()
            .filter(|line| line.len() < 3 || &line[..3] != id)
            .cloned()
            .collect();
        if kept.len() == lines.len() {
            return Err(BackendError::NotFound(id.to_string()));
        }
        let target = self.file(&format!("{id}.gpg"));
        if let Err(e) = std::fs::remove_file(&target) {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(BackendError::Operation(format!(
                    "Failed to remove {id}.gpg: {e}"
                )));
            }
        }
        self.write_index(&kept)?;
        self.commit_all(&format!("remove: {id}.gpg"))?;
        Ok(())
    }

    fn decrypt_record(&mut self, id: &str, answer: Option<&str>) -> BackendResult<String> {
        let name = format!("{id}.gpg");
        if !self.file(&name).exists() {
            return Err(BackendError::NotFound(id.to_string()));
        }
        let gpg = self.gpg()?;
        match answer {
            Some(answer) => {
                let passphrase = answer_digest(answer);
                let symmetric = run_checked(
                    Command::new(&gpg)
                        .args([
                            "--quiet",
                            "--decrypt",
                            "--batch",
                            "--yes",
                            "--passphrase",
                            &passphrase,
                        ])
                        .arg(self.file(&name))
                        .current_dir(&self.work_dir),
                    "gpg",
                )?;
                let plain = pipe_through(
                    Command::new(&gpg)
                        .args(["--quiet", "--decrypt"])
                        .current_dir(&self.work_dir),
                    &symmetric.stdout,
                    "gpg",
                )?;
                Ok(String::from_utf8_lossy(&plain.stdout).to_string())
            }
            None => self.decrypt_file(&name),
        }
    }

    fn register_challenge(
        &mut self,
        email: &str,
        question: &str,
        answer: &str,
    ) -> BackendResult<()> {
        let gpg = self.gpg()?;
        // The key pair must already exist for this address.
        run_checked(
            Command::new(&gpg)
                .args(["--list-key", email])
                .current_dir(&self.work_dir),
            "gpg",
        )?;
        self.encrypt_to(email, email, EMAIL_FILE)?;
        self.encrypt_to(email, question, QUESTION_FILE)?;
        self.encrypt_to(email, &answer_verifier(answer), ANSWER_FILE)?;
        Ok(())
    }

    fn verify_challenge(&mut self, answer: &str) -> BackendResult<bool> {
        let stored = self.decrypt_file(ANSWER_FILE)?;
        Ok(stored == answer_verifier(answer))
    }

    fn register_remote(&mut self, url: &str) -> BackendResult<()> {
        if self.remote_exists()? {
            return Ok(());
        }
        let git = self.git()?;
        run_checked(
            Command::new(&git)
                .args(["remote", "add", "origin", url])
                .current_dir(&self.work_dir),
            "git",
        )?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;

    use super::*;

    /// Scripted backend for state-machine tests: verification outcomes are
    /// dequeued in order and every collaborator call is counted.
    pub struct MockBackend {
        pub verify_script: VecDeque<BackendResult<bool>>,
        pub verify_calls: usize,
        pub added: Vec<NewRecord>,
        pub add_answers: Vec<String>,
        pub deleted: Vec<String>,
        pub decrypted: Vec<(String, Option<String>)>,
        pub registered: Vec<(String, String, String)>,
        pub remotes: Vec<String>,
        pub records: Vec<RecordSummary>,
        pub email: Option<String>,
        pub question: Option<String>,
        pub payload: String,
        pub fail_next_operation: Option<String>,
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self {
                verify_script: VecDeque::new(),
                verify_calls: 0,
                added: Vec::new(),
                add_answers: Vec::new(),
                deleted: Vec::new(),
                decrypted: Vec::new(),
                registered: Vec::new(),
                remotes: Vec::new(),
                records: Vec::new(),
                email: Some("dev@example.com".into()),
                question: Some("how do you call your dog?".into()),
                payload: "hunter2".into(),
                fail_next_operation: None,
            }
        }

        fn take_failure(&mut self) -> BackendResult<()> {
            match self.fail_next_operation.take() {
                Some(msg) => Err(BackendError::Operation(msg)),
                None => Ok(()),
            }
        }
    }

    impl SecretBackend for MockBackend {
        fn probe_environment(&mut self) -> BackendResult<EnvironmentReport> {
            Ok(EnvironmentReport {
                git: true,
                gpg: true,
            })
        }

        fn stored_email(&mut self) -> BackendResult<String> {
            self.email
                .clone()
                .ok_or_else(|| BackendError::Operation("GPG email has not been set yet".into()))
        }

        fn stored_question(&mut self) -> BackendResult<String> {
            self.question.clone().ok_or_else(|| {
                BackendError::Operation("Secret question has not been set yet".into())
            })
        }

        fn remote_exists(&mut self) -> BackendResult<bool> {
            Ok(!self.remotes.is_empty())
        }

        fn list_records(&mut self, search: &str) -> BackendResult<Vec<RecordSummary>> {
            self.take_failure()?;
            Ok(self
                .records
                .iter()
                .filter(|r| {
                    r.id.contains(search) || r.app.contains(search) || r.desc.contains(search)
                })
                .cloned()
                .collect())
        }

        fn add_record(&mut self, record: &NewRecord, answer: &str) -> BackendResult<()> {
            self.take_failure()?;
            self.added.push(record.clone());
            self.add_answers.push(answer.to_string());
            Ok(())
        }

        fn delete_record(&mut self, id: &str) -> BackendResult<()> {
            self.take_failure()?;
            // A populated mock store enforces NotFound; an empty one accepts
            // any id so gate tests need no fixtures.
            if !self.records.is_empty() && !self.records.iter().any(|r| r.id == id) {
                return Err(BackendError::NotFound(id.to_string()));
            }
            self.records.retain(|r| r.id != id);
            self.deleted.push(id.to_string());
            Ok(())
        }

        fn decrypt_record(&mut self, id: &str, answer: Option<&str>) -> BackendResult<String> {
            self.take_failure()?;
            self.decrypted
                .push((id.to_string(), answer.map(str::to_string)));
            Ok(self.payload.clone())
        }

        fn register_challenge(
            &mut self,
            email: &str,
            question: &str,
            answer: &str,
        ) -> BackendResult<()> {
            self.take_failure()?;
            self.registered
                .push((email.to_string(), question.to_string(), answer.to_string()));
            self.email = Some(email.to_string());
            self.question = Some(question.to_string());
            Ok(())
        }

        fn verify_challenge(&mut self, answer: &str) -> BackendResult<bool> {
            let _ = answer;
            self.verify_calls += 1;
            self.verify_script
                .pop_front()
                .unwrap_or(Ok(false))
        }

        fn register_remote(&mut self, url: &str) -> BackendResult<()> {
            self.take_failure()?;
            self.remotes.push(url.to_string());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_line_round_trips() {
        let line = index_line("001", "google", "passwords", ".txt");
        assert_eq!(line, "001.google.passwords.txt");
        let parsed = parse_index_line(&line).expect("parseable");
        assert_eq!(
            parsed,
            RecordSummary {
                id: "001".into(),
                app: "google".into(),
                desc: "passwords".into(),
                format: ".txt".into(),
            }
        );
    }

    #[test]
    fn malformed_index_lines_are_skipped() {
        assert!(parse_index_line("001.google").is_none());
        assert!(parse_index_line("").is_none());
        assert!(parse_index_line("001..desc.txt").is_none());
    }

    #[test]
    fn record_ids_continue_from_last_line() {
        assert_eq!(next_record_id(&[]).expect("empty index"), "001");
        let lines = vec![
            "001.google.passwords.txt".to_string(),
            "007.github.tokens.json".to_string(),
        ];
        assert_eq!(next_record_id(&lines).expect("valid index"), "008");
    }

    #[test]
    fn corrupt_index_is_reported() {
        let lines = vec!["xx".to_string()];
        assert!(next_record_id(&lines).is_err());
    }

    #[test]
    fn verifier_is_not_the_passphrase() {
        let digest = answer_digest("rexrex");
        let verifier = answer_verifier("rexrex");
        assert_ne!(digest, verifier);
        // Deterministic so the stored verifier keeps matching.
        assert_eq!(verifier, answer_verifier("rexrex"));
    }
}
