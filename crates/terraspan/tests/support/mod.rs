//! Scripted engine double shared by the integration tests.
//!
//! Responses are queued per subcommand (`init`, `plan`, `apply`, `output`,
//! `destroy`), so concurrent sessions can interleave without the script
//! depending on global call order. Once a queue is empty the engine
//! answers with success; `output` answers with the configured default
//! document (`{}` unless overridden).

// Each integration test binary compiles its own view of this module, so
// helpers unused by one binary are not dead code overall.
#![allow(dead_code)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use terraspan::engine::{CommandOutput, EngineError, EngineRequest, EngineRunner};

pub fn ok(stdout: &str) -> CommandOutput {
    CommandOutput {
        exit_code: 0,
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

pub fn fail(stderr: &str) -> CommandOutput {
    CommandOutput {
        exit_code: 1,
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

#[derive(Default)]
pub struct ScriptedEngine {
    queues: Mutex<HashMap<String, VecDeque<CommandOutput>>>,
    /// `(substring, response)` rules matched against every argument before
    /// the queues are consulted; lets one matrix case fail deterministically
    /// while its siblings succeed.
    rules: Mutex<Vec<(String, CommandOutput)>>,
    default_output_doc: Mutex<String>,
    log: Mutex<Vec<EngineRequest>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            default_output_doc: Mutex::new("{}".to_string()),
            ..Self::default()
        }
    }

    /// Queue the next response for one subcommand.
    pub fn enqueue(&self, subcommand: &str, response: CommandOutput) {
        self.queues
            .lock()
            .unwrap()
            .entry(subcommand.to_string())
            .or_default()
            .push_back(response);
    }

    /// Respond with `response` to any invocation whose arguments contain
    /// `substring`.
    pub fn fail_when_args_contain(&self, substring: &str, response: CommandOutput) {
        self.rules
            .lock()
            .unwrap()
            .push((substring.to_string(), response));
    }

    /// Set the document returned for unscripted `output` invocations.
    pub fn set_default_output_doc(&self, doc: &str) {
        *self.default_output_doc.lock().unwrap() = doc.to_string();
    }

    /// Subcommands of every invocation, in call order.
    pub fn invocations(&self) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter_map(|request| request.args.first().cloned())
            .collect()
    }

    pub fn count(&self, subcommand: &str) -> usize {
        self.invocations()
            .iter()
            .filter(|s| s.as_str() == subcommand)
            .count()
    }

    /// All recorded requests for one subcommand.
    pub fn requests_for(&self, subcommand: &str) -> Vec<EngineRequest> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|request| request.args.first().map(String::as_str) == Some(subcommand))
            .cloned()
            .collect()
    }
}

impl EngineRunner for ScriptedEngine {
    fn run(&self, request: &EngineRequest) -> Result<CommandOutput, EngineError> {
        self.log.lock().unwrap().push(request.clone());

        for (substring, response) in self.rules.lock().unwrap().iter() {
            if request.args.iter().any(|arg| arg.contains(substring.as_str())) {
                return Ok(response.clone());
            }
        }

        let subcommand = request.args.first().cloned().unwrap_or_default();
        if let Some(next) = self
            .queues
            .lock()
            .unwrap()
            .get_mut(&subcommand)
            .and_then(VecDeque::pop_front)
        {
            return Ok(next);
        }

        let stdout = if subcommand == "output" {
            self.default_output_doc.lock().unwrap().clone()
        } else {
            String::new()
        };
        Ok(ok(&stdout))
    }
}
