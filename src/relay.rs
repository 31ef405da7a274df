use anyhow::Result;
use std::fmt;
use std::io;
use tracing::{debug, error, info};

use crate::api::CompletionService;
use crate::config::Config;
use crate::input::resolve_message;

/// Fixed persona sent as the system turn of every request.
pub const TUTOR_INSTRUCTIONS: &str = "You are a helpful and friendly AI tutor for the student collaboration \
platform 'Section Connection.' Your role is to explain concepts clearly, \
guide students step-by-step, and help them understand rather than simply \
giving direct answers.\n\n\
Rules:\n\
- Provide helpful explanations at a college level.\n\
- Break down complex topics into simple steps.\n\
- Encourage understanding, not copying.\n\
- If the question seems like graded homework, give guidance without providing full solutions.\n\
- Always be supportive, positive, and educational.\n\
- Keep responses concise unless the student asks for more detail.\n\n\
Context: Section Connection was created at Towson University in 2025 \
to help students collaborate across course sections.";

pub const NO_INPUT: &str = "No input received.";

/// How a single invocation ended. Its `Display` form is exactly what goes to
/// stdout.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Answer(String),
    NoInput,
    Failed(String),
}

impl Outcome {
    /// No input is a successful exit; only real failures return 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Answer(_) | Outcome::NoInput => 0,
            Outcome::Failed(_) => 1,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Answer(answer) => write!(f, "{}", answer),
            Outcome::NoInput => write!(f, "{}", NO_INPUT),
            Outcome::Failed(description) => write!(f, "Error: {}", description),
        }
    }
}

/// Runs one relay cycle: credential check, input acquisition, then the single
/// completion call.
///
/// `make_service` is only invoked once the credential is known to be present,
/// and `read_stdin` only when `args` is empty.
pub async fn run<S, M, R>(
    config: Result<Config>,
    make_service: M,
    args: &[String],
    read_stdin: R,
) -> Outcome
where
    S: CompletionService,
    M: FnOnce(Config) -> S,
    R: FnOnce() -> io::Result<String>,
{
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Error: {}", e);
            return Outcome::Failed(e.to_string());
        }
    };
    info!("API key loaded successfully");
    let service = make_service(config);

    let Some(message) = resolve_message(args, read_stdin) else {
        info!("{}", NO_INPUT);
        return Outcome::NoInput;
    };
    debug!(
        "Proceeding with message: {}...",
        message.chars().take(50).collect::<String>()
    );

    match service.complete(TUTOR_INSTRUCTIONS, &message).await {
        Ok(answer) => {
            info!(
                "Got response ({} chars), returning to stdout",
                answer.chars().count()
            );
            Outcome::Answer(answer)
        }
        Err(e) => {
            error!("Completion API error: {}", e);
            Outcome::Failed(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Deterministic stand-in for the remote service that records what it
    /// was asked.
    struct EchoService {
        calls: Mutex<Vec<(String, String)>>,
    }

    impl EchoService {
        fn new() -> Self {
            EchoService {
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionService for &EchoService {
        async fn complete(&self, system: &str, user_message: &str) -> Result<String> {
            self.calls
                .lock()
                .unwrap()
                .push((system.to_string(), user_message.to_string()));
            Ok(format!("  tutor says: {}  ", user_message).trim().to_string())
        }
    }

    struct FailingService;

    #[async_trait]
    impl CompletionService for FailingService {
        async fn complete(&self, _system: &str, _user_message: &str) -> Result<String> {
            Err(anyhow!("API request failed with status 401 Unauthorized: bad key"))
        }
    }

    fn config() -> Result<Config> {
        Ok(Config {
            api: "http://localhost:9".to_string(),
            api_key: "sk-test".to_string(),
            model_id: "gpt-4o-mini".to_string(),
        })
    }

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|w| w.to_string()).collect()
    }

    fn empty_stdin() -> io::Result<String> {
        Ok(String::new())
    }

    #[tokio::test]
    async fn answer_is_printed_and_exits_zero() {
        let service = EchoService::new();
        let outcome = run(config(), |_| &service, &words(&["what", "is", "pi?"]), empty_stdin).await;
        assert_eq!(outcome.to_string(), "tutor says: what is pi?");
        assert_eq!(outcome.exit_code(), 0);

        let calls = service.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, TUTOR_INSTRUCTIONS);
        assert_eq!(calls[0].1, "what is pi?");
    }

    #[tokio::test]
    async fn leading_double_dash_reaches_the_service() {
        let service = EchoService::new();
        let outcome = run(config(), |_| &service, &words(&["--", "b"]), empty_stdin).await;
        assert_eq!(outcome, Outcome::Answer("tutor says: -- b".to_string()));
        assert_eq!(service.calls.lock().unwrap()[0].1, "-- b");
    }

    #[tokio::test]
    async fn json_stdin_is_relayed() {
        let service = EchoService::new();
        let outcome = run(config(), |_| &service, &[], || {
            Ok(r#"{"message": "What is a derivative?"}"#.to_string())
        })
        .await;
        assert_eq!(outcome, Outcome::Answer("tutor says: What is a derivative?".to_string()));
    }

    #[tokio::test]
    async fn empty_input_is_not_an_error() {
        let service = EchoService::new();
        let outcome = run(config(), |_| &service, &[], empty_stdin).await;
        assert_eq!(outcome.to_string(), "No input received.");
        assert_eq!(outcome.exit_code(), 0);
        assert!(service.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_credential_fails_before_anything_else() {
        let service = EchoService::new();
        let config = Config::from_lookup(|_| None);
        let outcome = run(config, |_| &service, &words(&["hello"]), empty_stdin).await;
        assert_eq!(
            outcome.to_string(),
            "Error: OPENAI_API_KEY environment variable is not set."
        );
        assert_eq!(outcome.exit_code(), 1);
        assert!(service.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn call_failure_goes_to_stdout_with_error_prefix() {
        let outcome = run(config(), |_| FailingService, &words(&["hello"]), empty_stdin).await;
        assert!(outcome.to_string().starts_with("Error: "));
        assert!(outcome.to_string().contains("bad key"));
        assert_eq!(outcome.exit_code(), 1);
    }

    #[tokio::test]
    async fn repeated_runs_print_the_same_text() {
        let service = EchoService::new();
        let args = words(&["explain", "big-O"]);
        let first = run(config(), |_| &service, &args, empty_stdin).await;
        let second = run(config(), |_| &service, &args, empty_stdin).await;
        assert_eq!(first.to_string(), second.to_string());
    }
}
