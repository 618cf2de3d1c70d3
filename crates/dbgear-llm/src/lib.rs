// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use dbgear_app::{FillAssistant, FillRequest, FillSuggestion, GridColumn};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

pub const SET_DATA_FUNCTION: &str = "setData";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Parsed assistant turn: free text and, when present, a `setData` call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FillReply {
    pub content: Option<String>,
    pub column: Option<String>,
    pub data: Option<String>,
}

/// OpenAI-compatible chat client used to generate column values.
#[derive(Debug, Clone)]
pub struct ChatClient {
    base_url: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
    http: HttpClient,
    history: Vec<Message>,
}

impl ChatClient {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            bail!("llm.base_url must not be empty");
        }
        if model.trim().is_empty() {
            bail!("llm.model must not be empty");
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            model: model.to_owned(),
            api_key: api_key
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_owned),
            timeout,
            http,
            history: Vec::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }

    pub fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .authorize(self.http.get(format!("{}/models", self.base_url)))
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }

        let parsed: ModelsResponse = response.json().context("decode model list")?;
        Ok(parsed.data.into_iter().map(|model| model.id).collect())
    }

    pub fn ping(&self) -> Result<()> {
        let models = self.list_models()?;
        if !models.iter().any(|name| name == &self.model) {
            bail!(
                "model {:?} not offered by {} -- set llm.model to one of: {}",
                self.model,
                self.base_url,
                models.join(", ")
            );
        }
        Ok(())
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// Sends one chat turn with the `setData` function offered.
    pub fn complete(&self, messages: &[Message]) -> Result<FillReply> {
        let request = ChatRequest::new(&self.model, messages);
        let response = self
            .authorize(self.http.post(format!("{}/chat/completions", self.base_url)))
            .json(&request)
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;

        let status = response.status();
        let body = response.text().context("read chat response")?;
        if !status.is_success() {
            return Err(clean_error_response(status, &body));
        }
        parse_fill_reply(&body)
    }

    /// Runs one turn of the fill conversation, keeping the history.
    pub fn ask(&mut self, request: &FillRequest<'_>) -> Result<FillReply> {
        let instruction = request.instruction.trim();
        if instruction.is_empty() {
            bail!("describe the values to generate -- the instruction is empty");
        }
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(Message::new(
            Role::System,
            build_fill_prompt(request.columns, request.row_count),
        ));
        messages.extend(self.history.iter().cloned());
        messages.push(Message::new(Role::User, instruction));

        let reply = self.complete(&messages)?;
        debug!(
            model = %self.model,
            column = ?reply.column,
            turns = self.history.len() / 2 + 1,
            "fill reply received"
        );

        self.history.push(Message::new(Role::User, instruction));
        let summary = match (&reply.content, &reply.column) {
            (Some(content), _) if !content.is_empty() => content.clone(),
            (_, Some(column)) => format!("{SET_DATA_FUNCTION}({column})"),
            _ => String::new(),
        };
        self.history.push(Message::new(Role::Assistant, summary));
        Ok(reply)
    }
}

impl FillAssistant for ChatClient {
    fn suggest(&mut self, request: &FillRequest<'_>) -> Result<FillSuggestion> {
        let reply = self.ask(request)?;
        Ok(FillSuggestion {
            reply: reply.content,
            column: reply.column,
            value: reply.data,
        })
    }
}

pub fn build_fill_prompt(columns: &[GridColumn], row_count: usize) -> String {
    let mut out = String::new();
    out.push_str("You generate test data for one column of a database table.\n");
    out.push_str("\n## Columns\n\n");
    for column in columns {
        let header = if column.header_name.is_empty() {
            &column.field
        } else {
            &column.header_name
        };
        out.push_str(&format!("* {header} ({})\n", column.field));
    }
    out.push_str("\nRules:\n");
    out.push_str(&format!(
        "1. Produce exactly {row_count} values, one per line, in row order.\n"
    ));
    out.push_str(&format!(
        "2. Call `{SET_DATA_FUNCTION}` with the column name and the newline-separated values.\n"
    ));
    out.push_str("3. If the request is unclear, ask a short question instead of calling the function.\n");
    out
}

/// Reads `choices[0].message` of a chat completion body.
pub fn parse_fill_reply(body: &str) -> Result<FillReply> {
    let parsed: ChatCompletionResponse =
        serde_json::from_str(body).context("decode chat response")?;
    let message = parsed
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or_else(|| anyhow!("no choices in chat response"))?;

    let mut reply = FillReply {
        content: message.content.filter(|content| !content.trim().is_empty()),
        ..FillReply::default()
    };
    if let Some(call) = message.function_call
        && call.name == SET_DATA_FUNCTION
    {
        let arguments: SetDataArguments = serde_json::from_str(&call.arguments)
            .with_context(|| format!("decode {SET_DATA_FUNCTION} arguments"))?;
        reply.column = Some(arguments.column);
        reply.data = Some(arguments.data.replace("\\n", "\n"));
    }
    Ok(reply)
}

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    anyhow!(
        "cannot reach {} -- check llm.base_url and that the server is up ({})",
        base_url,
        error
    )
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<OpenAIErrorEnvelope>(body)
        && let Some(error) = parsed.error
        && !error.message.is_empty()
    {
        if status == StatusCode::UNAUTHORIZED {
            return anyhow!(
                "server error ({}): {} -- set llm.api_key or DBGEAR_API_KEY",
                status.as_u16(),
                error.message
            );
        }
        return anyhow!("server error ({}): {}", status.as_u16(), error.message);
    }

    if body.len() < 100 && !body.contains('{') {
        return anyhow!("server error ({}): {}", status.as_u16(), body);
    }

    anyhow!("server returned {}", status.as_u16())
}

fn set_data_schema() -> Value {
    json!({
        "name": SET_DATA_FUNCTION,
        "description": "Fill one column of the grid with newline-separated values.",
        "parameters": {
            "type": "object",
            "properties": {
                "column": {
                    "type": "string",
                    "description": "Column name as listed in the prompt"
                },
                "data": {
                    "type": "string",
                    "description": "One value per row, separated by newlines"
                }
            },
            "required": ["column", "data"]
        }
    })
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    functions: Vec<Value>,
    temperature: f32,
}

impl<'a> ChatRequest<'a> {
    fn new(model: &'a str, messages: &'a [Message]) -> Self {
        Self {
            model,
            messages: messages
                .iter()
                .map(|message| ChatMessage {
                    role: message.role.as_str(),
                    content: &message.content,
                })
                .collect(),
            functions: vec![set_data_schema()],
            temperature: 0.0,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct SetDataArguments {
    column: String,
    #[serde(default)]
    data: String,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelRow>,
}

#[derive(Debug, Deserialize)]
struct ModelRow {
    id: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorEnvelope {
    error: Option<OpenAIErrorBody>,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorBody {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::{ChatRequest, Message, Role, build_fill_prompt, parse_fill_reply};
    use anyhow::Result;
    use dbgear_app::GridColumn;

    fn column(field: &str, header: &str) -> GridColumn {
        GridColumn {
            field: field.to_owned(),
            column_type: "string".to_owned(),
            header_name: header.to_owned(),
            width: 150,
            editable: true,
            hide: false,
            items: Vec::new(),
            fixed_value: None,
            call_value: None,
        }
    }

    #[test]
    fn fill_prompt_lists_columns_and_row_count() {
        let prompt = build_fill_prompt(&[column("name", "Name"), column("email", "")], 12);
        assert!(prompt.contains("* Name (name)\n"));
        assert!(prompt.contains("* email (email)\n"));
        assert!(prompt.contains("exactly 12 values"));
    }

    #[test]
    fn parse_fill_reply_reads_set_data_call() -> Result<()> {
        let body = r#"{"choices":[{"message":{"content":null,"function_call":{
            "name":"setData","arguments":"{\"column\":\"Name\",\"data\":\"Ann\\\\nBen\"}"}}}]}"#;
        let reply = parse_fill_reply(body)?;
        assert_eq!(reply.content, None);
        assert_eq!(reply.column.as_deref(), Some("Name"));
        assert_eq!(reply.data.as_deref(), Some("Ann\nBen"));
        Ok(())
    }

    #[test]
    fn parse_fill_reply_keeps_plain_answers() -> Result<()> {
        let reply =
            parse_fill_reply(r#"{"choices":[{"message":{"content":"Which column?"}}]}"#)?;
        assert_eq!(reply.content.as_deref(), Some("Which column?"));
        assert!(reply.column.is_none());
        Ok(())
    }

    #[test]
    fn parse_fill_reply_ignores_other_functions() -> Result<()> {
        let reply = parse_fill_reply(
            r#"{"choices":[{"message":{"content":"ok","function_call":{"name":"other","arguments":"{}"}}}]}"#,
        )?;
        assert!(reply.data.is_none());
        Ok(())
    }

    #[test]
    fn parse_fill_reply_rejects_empty_choices() {
        assert!(parse_fill_reply(r#"{"choices":[]}"#).is_err());
    }

    #[test]
    fn chat_request_offers_set_data() -> Result<()> {
        let messages = [Message::new(Role::User, "names")];
        let request = ChatRequest::new("gpt-4o-mini", &messages);
        let encoded = serde_json::to_value(&request)?;
        assert_eq!(encoded["functions"][0]["name"], "setData");
        assert_eq!(encoded["messages"][0]["role"], "user");
        Ok(())
    }
}
