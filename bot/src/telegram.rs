//! Minimal Telegram Bot API client: long polling and the handful of send
//! methods the bot uses.

use reqwest::multipart::{Form, Part};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{error::Error, fmt::Display, path::Path, time::Duration};

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// `sendMessage` rejects longer texts.
pub const MAX_MESSAGE_LENGTH: usize = 4096;

pub struct TelegramClient {
    /// `{api_url}/bot{token}`. Never log this.
    base_url: String,
    client: reqwest::Client,
    request_timeout: Duration,
    poll_timeout: Duration,
}

impl TelegramClient {
    pub fn new(token: String) -> TelegramClientBuilder {
        TelegramClientBuilder::new(token)
    }

    fn from_builder(builder: TelegramClientBuilder) -> Result<Self, TelegramBuilderError> {
        let mut api_url = builder.api_url.trim();
        if let Some(without_trailing_slash) = api_url.strip_suffix('/') {
            api_url = without_trailing_slash;
        }
        if api_url.is_empty() {
            return Err(TelegramBuilderError::InvalidUrl);
        }

        let token = builder.token.trim();
        if token.is_empty() {
            return Err(TelegramBuilderError::InvalidToken);
        }

        let client = reqwest::Client::builder()
            .build()
            .map_err(TelegramBuilderError::ReqwestError)?;

        Ok(Self {
            base_url: format!("{}/bot{}", api_url, token),
            client,
            request_timeout: builder.request_timeout,
            poll_timeout: builder.poll_timeout,
        })
    }

    /// The bot's own account, used to tell which `/cmd@name` commands are
    /// addressed to it.
    pub async fn get_me(&self) -> Result<User, TelegramError> {
        self.call("getMe", &serde_json::json!({}), self.request_timeout)
            .await
    }

    /// Long polls for updates with an id of at least `offset`.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, TelegramError> {
        let body = GetUpdates {
            offset,
            timeout: self.poll_timeout.as_secs(),
            allowed_updates: &["message"],
        };

        // leave the server room to answer before giving up locally
        let timeout = self.poll_timeout + self.request_timeout;
        self.call("getUpdates", &body, timeout).await
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: Option<ParseMode>,
        reply_markup: Option<&ReplyKeyboardMarkup>,
    ) -> Result<Message, TelegramError> {
        let body = SendMessage {
            chat_id,
            text,
            parse_mode,
            reply_markup,
        };
        self.call("sendMessage", &body, self.request_timeout).await
    }

    /// Uploads a local image.
    pub async fn send_photo(
        &self,
        chat_id: i64,
        path: &Path,
        caption: &str,
    ) -> Result<Message, TelegramError> {
        let photo = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "photo".to_owned());

        let response = self
            .client
            .post(format!("{}/sendPhoto", self.base_url))
            .timeout(self.request_timeout)
            .multipart(photo_form(chat_id, caption, file_name, photo))
            .send()
            .await?
            .bytes()
            .await?;

        decode_response(&response)
    }

    pub async fn set_my_commands(&self, commands: &[BotCommand]) -> Result<bool, TelegramError> {
        let body = SetMyCommands { commands };
        self.call("setMyCommands", &body, self.request_timeout).await
    }

    async fn call<B, T>(&self, method: &str, body: &B, timeout: Duration) -> Result<T, TelegramError>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        trace!("calling telegram method '{}'", method);
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, method))
            .timeout(timeout)
            .json(body)
            .send()
            .await?
            .bytes()
            .await?;

        decode_response(&response)
    }
}

/// Telegram answers errors with a JSON body too, so the status code is not
/// checked separately.
fn decode_response<T>(body: &[u8]) -> Result<T, TelegramError>
where
    T: DeserializeOwned,
{
    let response: ApiResponse<T> = serde_json::from_slice(body)?;
    response.into_result()
}

fn photo_form(chat_id: i64, caption: &str, file_name: String, photo: Vec<u8>) -> Form {
    Form::new()
        .text("chat_id", chat_id.to_string())
        .text("caption", caption.to_owned())
        .part("photo", Part::bytes(photo).file_name(file_name))
}

pub struct TelegramClientBuilder {
    api_url: String,
    token: String,
    request_timeout: Duration,
    poll_timeout: Duration,
}

impl TelegramClientBuilder {
    fn new(token: String) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_owned(),
            token,
            request_timeout: Duration::from_secs(10),
            poll_timeout: Duration::from_secs(30),
        }
    }

    pub fn api_url(mut self, api_url: String) -> Self {
        self.api_url = api_url;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// How long `getUpdates` waits server side for new updates.
    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<TelegramClient, TelegramBuilderError> {
        TelegramClient::from_builder(self)
    }
}

#[derive(Deserialize, Debug)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i32>,
}

impl<T> ApiResponse<T> {
    fn into_result(self) -> Result<T, TelegramError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(TelegramError::Api {
                code: self.error_code,
                description: self
                    .description
                    .unwrap_or_else(|| "no description".to_owned()),
            }),
        }
    }
}

#[derive(Serialize)]
struct GetUpdates<'a> {
    offset: i64,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<ParseMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a ReplyKeyboardMarkup>,
}

#[derive(Serialize)]
struct SetMyCommands<'a> {
    commands: &'a [BotCommand],
}

#[derive(Deserialize, Debug, Clone)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub location: Option<Location>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Chat {
    pub id: i64,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    MarkdownV2,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ReplyKeyboardMarkup {
    pub keyboard: Vec<Vec<KeyboardButton>>,
    pub resize_keyboard: bool,
    pub one_time_keyboard: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct KeyboardButton {
    pub text: String,
    pub request_location: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct BotCommand {
    pub command: String,
    pub description: String,
}

#[derive(Debug)]
pub enum TelegramBuilderError {
    InvalidUrl,
    InvalidToken,
    ReqwestError(reqwest::Error),
}

impl Display for TelegramBuilderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TelegramBuilderError::InvalidUrl => write!(f, "invalid telegram api url"),
            TelegramBuilderError::InvalidToken => write!(f, "missing telegram bot token"),
            TelegramBuilderError::ReqwestError(e) => {
                write!(f, "could not create http client: '{}'", e)
            }
        }
    }
}

impl Error for TelegramBuilderError {}

#[derive(Debug)]
pub enum TelegramError {
    ReqwestError(reqwest::Error),
    SerdeError(serde_json::Error),
    IoError(std::io::Error),
    Api {
        code: Option<i32>,
        description: String,
    },
}

impl Display for TelegramError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let output = match self {
            TelegramError::ReqwestError(e) => format!("reqwest error: '{}'", e),
            TelegramError::SerdeError(serde_error) => format!("serde error: '{}'", serde_error),
            TelegramError::IoError(e) => format!("io error: '{}'", e),
            TelegramError::Api { code, description } => match code {
                Some(code) => format!("telegram error {}: '{}'", code, description),
                None => format!("telegram error: '{}'", description),
            },
        };

        write!(f, "{}", output)
    }
}

impl From<reqwest::Error> for TelegramError {
    fn from(e: reqwest::Error) -> Self {
        Self::ReqwestError(e)
    }
}

impl From<serde_json::Error> for TelegramError {
    fn from(e: serde_json::Error) -> Self {
        Self::SerdeError(e)
    }
}

impl From<std::io::Error> for TelegramError {
    fn from(e: std::io::Error) -> Self {
        Self::IoError(e)
    }
}

impl Error for TelegramError {}
