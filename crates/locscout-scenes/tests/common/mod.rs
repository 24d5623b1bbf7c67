use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use locscout_llm::{CompletionRequest, LlmError, TextCompletion};

type Responder = dyn Fn(&CompletionRequest) -> Result<String, LlmError> + Send + Sync;

/// Completion fake that either replays a fixed queue of answers or computes
/// one from the prompt. Every request is recorded.
pub struct ScriptedLlm {
    queue: Mutex<VecDeque<Result<String, LlmError>>>,
    responder: Option<Box<Responder>>,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLlm {
    pub fn queue(answers: Vec<Result<String, LlmError>>) -> Self {
        Self {
            queue: Mutex::new(answers.into()),
            responder: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn by_prompt<F>(responder: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self {
            queue: Mutex::new(VecDeque::new()),
            responder: Some(Box::new(responder)),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn prompt(&self, index: usize) -> String {
        self.requests.lock().unwrap()[index].prompt.clone()
    }
}

#[async_trait]
impl TextCompletion for ScriptedLlm {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(responder) = &self.responder {
            return responder(&request);
        }
        self.queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(LlmError::EmptyResponse))
    }
}
