//! ReAct agent loop.
//!
//! An agent renders a system turn describing its role and tools, then calls a
//! [`LanguageModel`] repeatedly. Each reply is read with the ReAct grammar:
//! actions are executed against the tool registry and their results appended
//! as `Observation:` lines, until the model produces a final answer.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::message::Turn;
use crate::provider::{CallRequest, LanguageModel};
use crate::react::{self, ActionBlock, AgentReply};
use crate::tool::ToolRegistry;

/// Configuration for an agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Short identifier used in logs.
    pub name: String,
    pub role: String,
    pub goal: String,
    pub backstory: String,
    /// Maximum model calls before giving up.
    pub max_iterations: usize,
}

impl AgentConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: String::new(),
            goal: String::new(),
            backstory: String::new(),
            max_iterations: 15,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = goal.into();
        self
    }

    pub fn with_backstory(mut self, backstory: impl Into<String>) -> Self {
        self.backstory = backstory.into();
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }
}

const FORMAT_WITH_TOOLS: &str = r#"IMPORTANT: Use the following format in your response:

```
Thought: you should always think about what to do
Action: the action to take, only one name of [{tool_names}], just the name, exactly as it's written.
Action Input: the input to the action, just a simple JSON object, enclosed in curly braces, using " to wrap keys and values.
Observation: the result of the action
```

Once all necessary information is gathered, return the following format:

```
Thought: I now know the final answer
Final Answer: the final answer to the original input question
```"#;

const FORMAT_WITHOUT_TOOLS: &str = r#"IMPORTANT: Use the following format in your response:

```
Thought: I now can give a great answer
Final Answer: your complete final answer, it must be outcome described
```"#;

pub struct ReactAgent {
    pub config: AgentConfig,
    tools: Arc<ToolRegistry>,
}

impl ReactAgent {
    pub fn new(config: AgentConfig, tools: Arc<ToolRegistry>) -> Self {
        Self { config, tools }
    }

    /// Render the system turn. Tool blocks go last: a block's description
    /// runs until the next `Tool Name:` or the end of the text.
    pub fn system_prompt(&self) -> String {
        let mut prompt = format!(
            "You are {}. {}\nYour personal goal is: {}\n\n",
            self.config.role, self.config.backstory, self.config.goal
        );

        if self.tools.is_empty() {
            prompt.push_str(FORMAT_WITHOUT_TOOLS);
            return prompt;
        }

        prompt.push_str(
            &FORMAT_WITH_TOOLS.replace("{tool_names}", &self.tools.names().join(", ")),
        );
        prompt.push_str(
            "\n\nYou ONLY have access to the following tools, and should NEVER make up tools that are not listed here:\n",
        );
        for def in self.tools.definitions() {
            let arguments =
                serde_json::to_string(&def.parameters.properties).unwrap_or_else(|_| "{}".into());
            prompt.push_str(&format!(
                "\nTool Name: {}\nTool Arguments: {}\nTool Description: {}\n",
                def.name, arguments, def.description
            ));
        }
        prompt
    }

    /// Run the agent on a task until it produces a final answer.
    pub async fn run(&self, model: &dyn LanguageModel, task: &str) -> Result<String, Error> {
        let agent = &self.config.name;
        let mut turns = vec![Turn::system(self.system_prompt()), Turn::user(task)];

        for iteration in 1..=self.config.max_iterations {
            debug!(
                %agent,
                iteration,
                max_iterations = self.config.max_iterations,
                turns = turns.len(),
                "Agent iteration"
            );

            let request =
                CallRequest::new(turns.clone()).with_functions(Arc::clone(&self.tools));
            let reply = model.call(request).await?;

            match react::parse_reply(&reply) {
                AgentReply::FinalAnswer(answer) => {
                    info!(%agent, iteration, answer_len = answer.len(), "Agent finished");
                    return Ok(answer);
                }
                AgentReply::Action(block) => {
                    info!(%agent, tool = %block.tool, "Executing tool");
                    let observation = self.execute(&block).await;
                    turns.push(Turn::assistant(format!(
                        "{}\n{}",
                        reply.trim_end(),
                        react::render_observation(&observation)
                    )));
                }
                AgentReply::Observation(result) => {
                    debug!(%agent, "Model surfaced a pending tool result");
                    turns.push(Turn::assistant(react::render_observation(&result)));
                }
                AgentReply::Text(text) => {
                    warn!(%agent, iteration, "Reply had no ReAct markers, using it as the answer");
                    return Ok(text.trim().to_string());
                }
            }
        }

        Err(Error::MaxIterations {
            agent: agent.clone(),
            iterations: self.config.max_iterations,
        })
    }

    /// Execute an action and encode its result as a JSON object observation.
    async fn execute(&self, block: &ActionBlock) -> String {
        let Some(tool) = self.tools.get(&block.tool) else {
            return json!({
                "error": format!(
                    "Unknown tool '{}'. Available tools: {}",
                    block.tool,
                    self.tools.names().join(", ")
                )
            })
            .to_string();
        };

        match tool.execute(Value::Object(block.arguments())).await {
            Ok(output) if output.is_error => json!({ "error": output.content }).to_string(),
            Ok(output) => observation_json(&output.content),
            Err(e) => {
                warn!(tool = %block.tool, error = %e, "Tool execution failed");
                json!({ "error": e.to_string() }).to_string()
            }
        }
    }
}

/// JSON object output passes through; anything else is wrapped as `{"result": ...}`.
fn observation_json(content: &str) -> String {
    match serde_json::from_str::<Value>(content) {
        Ok(value @ Value::Object(_)) => value.to_string(),
        _ => json!({ "result": content }).to_string(),
    }
}
