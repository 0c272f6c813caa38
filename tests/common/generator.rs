//! Scripted text generator

#![allow(dead_code)]

use async_trait::async_trait;
use auto_pr::error::{Error, Result};
use auto_pr::generate::{GenerationContext, TextGenerator};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Returns queued replies in order, then `generated text N`
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<std::result::Result<String, String>>>,
    contexts: Mutex<Vec<GenerationContext>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            contexts: Mutex::new(Vec::new()),
        }
    }

    /// Generator whose replies are exactly `texts`, in order
    pub fn with_replies(texts: &[&str]) -> Self {
        let generator = Self::new();
        for text in texts {
            generator.queue_reply(text);
        }
        generator
    }

    pub fn queue_reply(&self, text: &str) {
        self.replies.lock().unwrap().push_back(Ok(text.to_string()));
    }

    pub fn queue_failure(&self, msg: &str) {
        self.replies.lock().unwrap().push_back(Err(msg.to_string()));
    }

    /// Every context passed to `generate`, oldest first
    pub fn contexts(&self) -> Vec<GenerationContext> {
        self.contexts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.contexts.lock().unwrap().len()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, context: &GenerationContext) -> Result<String> {
        let call = {
            let mut contexts = self.contexts.lock().unwrap();
            contexts.push(context.clone());
            contexts.len()
        };
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(msg)) => Err(Error::GenerationFailed(msg)),
            None => Ok(format!("generated text {call}")),
        }
    }
}
