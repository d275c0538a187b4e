//! Test-only helpers: scripted agents and request builders.

use std::collections::VecDeque;
use std::fs;
use std::sync::Mutex;

use anyhow::{Result, anyhow, bail};
use serde_json::Value;

use crate::core::types::{ActionRequest, AgentReply};
use crate::io::agent::{Agent, DecideRequest};

/// Build an action request with the given wire name, arguments, and id.
pub fn request(name: &str, arguments: Value, request_id: &str) -> ActionRequest {
    ActionRequest {
        name: name.to_string(),
        arguments,
        request_id: request_id.to_string(),
    }
}

/// Build an `actions` reply from a batch of requests.
pub fn actions_reply(requests: Vec<ActionRequest>) -> AgentReply {
    AgentReply::Actions {
        requests,
        usage: None,
    }
}

/// Build a `final` reply with the given answer.
pub fn final_reply(answer: &str) -> AgentReply {
    AgentReply::Final {
        answer: answer.to_string(),
        usage: None,
    }
}

/// Agent that replays a fixed sequence of replies without spawning processes.
///
/// Each `decide` call consumes the next reply; running out of replies is an
/// error, which the loop treats as a collaborator failure.
pub struct ScriptedAgent {
    replies: Mutex<VecDeque<AgentReply>>,
}

impl ScriptedAgent {
    pub fn new(replies: Vec<AgentReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
        }
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().map(|r| r.len()).unwrap_or(0)
    }
}

impl Agent for ScriptedAgent {
    fn decide(&self, request: &DecideRequest) -> Result<()> {
        let reply = {
            let mut replies = self
                .replies
                .lock()
                .map_err(|_| anyhow!("scripted agent lock poisoned"))?;
            let Some(reply) = replies.pop_front() else {
                bail!("scripted agent ran out of replies");
            };
            reply
        };
        if let Some(parent) = request.output_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut buf = serde_json::to_string_pretty(&reply)?;
        buf.push('\n');
        fs::write(&request.output_path, buf)?;
        Ok(())
    }
}

/// Agent whose decide call always fails, for collaborator-failure paths.
pub struct FailingAgent;

impl Agent for FailingAgent {
    fn decide(&self, _request: &DecideRequest) -> Result<()> {
        Err(anyhow!("model endpoint unreachable"))
    }
}
