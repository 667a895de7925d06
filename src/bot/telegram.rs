use {
    crate::utils::Result,
    reqwest::multipart::{Form, Part},
    serde::{de::{DeserializeOwned, IgnoredAny}, Deserialize, Serialize},
    serde_json::Value,
    std::{fmt::Debug, future::Future},
};

pub const MAX_MSG_LEN: usize = 4096;
pub const MAX_CAPTION_LEN: usize = 1024;
/// Largest file a bot may upload through the public Bot API.
pub const MAX_UPLOAD_SIZE: u64 = 50 << 20;

pub trait Request: Serialize {
    const NAME: &str;
    type Response: DeserializeOwned;
}

#[derive(Debug, Serialize)]
pub struct SetWebhook<'url, 'secret_token> {
    pub url: &'url str,
    pub drop_pending_updates: bool,
    pub allowed_updates: &'static [&'static str],
    pub secret_token: Option<&'secret_token str>,
}

#[derive(Debug, Serialize)]
pub struct DeleteWebhook {
    pub drop_pending_updates: bool,
}

#[derive(Debug, Serialize)]
pub struct GetUpdates {
    pub offset: u64,
    pub timeout: u32,
    pub allowed_updates: &'static [&'static str],
}

pub const ALLOWED_UPDATES: &[&str] = &["message", "callback_query"];

#[derive(Debug, Serialize)]
pub struct BotCommand {
    pub command: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SetMyCommands<'commands, 'language_code> {
    pub commands: &'commands [BotCommand],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_code: Option<&'language_code str>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    #[serde(rename = "update_id")]
    pub id: u64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

impl Update {
    pub fn from(&self) -> Option<&User> {
        match (&self.message, &self.callback_query) {
            (Some(msg), _) => msg.from.as_ref(),
            (None, Some(query)) => Some(&query.from),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Message {
    #[serde(rename = "message_id")]
    pub id: i32,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<Box<str>>,
    #[serde(default)]
    pub entities: Box<[MessageEntity]>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageEntity {
    pub length: usize,
    pub offset: usize,
    #[serde(flatten)]
    pub kind: MessageEntityKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageEntityKind {
    BotCommand,
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub id: Box<str>,
    pub from: User,
    /// Absent if the message with the button is too old.
    pub message: Option<Message>,
    pub data: Option<Box<str>>,
}

#[derive(Debug, Deserialize)]
pub struct User {
    pub id: u64,
    pub is_bot: bool,
    pub first_name: Box<str>,
    pub last_name: Option<Box<str>>,
    pub username: Option<Box<str>>,
    pub language_code: Option<Box<str>>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: ChatKind,
    pub title: Option<Box<str>>,
    pub username: Option<Box<str>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
}

#[derive(Debug, Serialize)]
pub struct InlineKeyboardButton<'text, 'data> {
    pub text: &'text str,
    pub callback_data: &'data str,
}

#[derive(Debug, Serialize)]
pub struct InlineKeyboardMarkup<'text, 'data> {
    pub inline_keyboard: Vec<[InlineKeyboardButton<'text, 'data>; 1]>,
}

#[derive(Debug, Default, Serialize)]
pub struct SendMessage<'text, 'markup> {
    pub chat_id: i64,
    pub text: &'text str,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub disable_web_page_preview: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_message_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<&'markup InlineKeyboardMarkup<'markup, 'markup>>,
}

#[derive(Debug, Default, Serialize)]
pub struct SendAudio<'audio, 'meta> {
    pub chat_id: i64,
    pub audio: &'audio str,
    pub caption: &'meta str,
    pub title: &'meta str,
    pub performer: &'meta str,
}

#[derive(Debug, Default, Serialize)]
pub struct SendDocument<'document> {
    pub chat_id: i64,
    pub document: &'document str,
}

#[derive(Debug, Serialize)]
pub struct EditMessageText<'text> {
    pub chat_id: i64,
    pub message_id: i32,
    pub text: &'text str,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub disable_web_page_preview: bool,
}

#[derive(Debug, Serialize)]
pub struct DeleteMessage {
    pub chat_id: i64,
    pub message_id: i32,
}

#[derive(Debug, Serialize)]
pub struct AnswerCallbackQuery<'id, 'text> {
    pub callback_query_id: &'id str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<&'text str>,
}

#[derive(Debug, Serialize)]
pub struct GetMe {}

macro_rules! impl_request {
    ($($req:ident $(<$($arg:tt),+>)? => $resp:ty;)+) => {
        $(
            impl Request for $req $(<$($arg),+>)? {
                const NAME: &'static str = stringify!($req);
                type Response = $resp;
            }
        )+
    };
}

impl_request! {
    SetWebhook<'_, '_> => bool;
    DeleteWebhook => bool;
    GetUpdates => Vec<Update>;
    SetMyCommands<'_, '_> => bool;
    SendMessage<'_, '_> => Message;
    GetMe => User;
    SendAudio<'_, '_> => Message;
    SendDocument<'_> => Message;
    // Either the edited message or `true`, neither is needed
    EditMessageText<'_> => IgnoredAny;
    DeleteMessage => bool;
    AnswerCallbackQuery<'_, '_> => bool;
}

#[derive(Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    #[serde(default)]
    description: String,
    result: Option<T>,
}

impl<T> TelegramResponse<T> {
    fn into_result(self, method: &str) -> Result<T> {
        match self {
            Self { ok: true, result: Some(result), .. } => Ok(result),
            Self { mut description, .. } => Err({
                description.insert_str(0, ": Telegram API error: ");
                description.insert_str(0, method);
                description.into()
            }),
        }
    }
}

/// Top-level strings are sent as is, everything else as JSON, which is what the Bot API expects
/// from `multipart/form-data` parameters.
fn serialise_into_form<R: Request>(req: &R) -> Result<Form> {
    let Value::Object(fields) = serde_json::to_value(req)? else {
        return Err(format!("{} can't be represented as multipart/form-data", R::NAME).into());
    };

    Ok(fields.into_iter().fold(Form::new(), |form, (key, value)| match value {
        Value::Null => form,
        Value::String(s) => form.text(key, s),
        other => form.text(key, other.to_string()),
    }))
}

pub struct Client {
    inner: reqwest::Client,
    /// `{api_url}/bot{token}/`
    base: Box<str>,
}

impl Client {
    pub fn new(api_url: &str, token: &str) -> Self {
        Self { inner: reqwest::Client::new(), base: format!("{api_url}/bot{token}/").into() }
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.inner
    }

    fn url<R: Request>(&self) -> String {
        format!("{}{}", self.base, R::NAME)
    }

    pub fn request<R: Request + Debug>(&self, req: &R) -> impl Future<Output = Result<R::Response>> + Send {
        log::debug!("About to send to Telegram: {req:?}");
        let req = self.inner.post(self.url::<R>()).json(req);
        async move { req.send().await?.json::<TelegramResponse<_>>().await?.into_result(R::NAME) }
    }

    /// The `payload` will be referred to in the request as "payload"
    pub fn multipart_request<R: Request + Debug>(&self, req: &R, payload: Part)
        -> impl Future<Output = Result<R::Response>> + Send
    {
        log::debug!("About to send to Telegram: {req:?}");
        let req = serialise_into_form(req)
            .map(|form| self.inner.post(self.url::<R>()).multipart(form.part("payload", payload)));

        async move { req?.send().await?.json::<TelegramResponse<_>>().await?.into_result(R::NAME) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_message_update() {
        let update: Update = serde_json::from_str(r#"{
            "update_id": 7,
            "message": {
                "message_id": 12,
                "date": 1700000000,
                "from": {"id": 42, "is_bot": false, "first_name": "Ann", "language_code": "en"},
                "chat": {"id": 42, "type": "private", "first_name": "Ann"},
                "text": "/start@songdrop_bot",
                "entities": [{"type": "bot_command", "offset": 0, "length": 19}]
            }
        }"#).unwrap();

        assert_eq!(update.id, 7);
        assert_eq!(update.from().unwrap().id, 42);
        let msg = update.message.unwrap();
        assert_eq!(msg.chat.kind, ChatKind::Private);
        assert_eq!(msg.text.as_deref(), Some("/start@songdrop_bot"));
        assert_eq!(msg.entities[0].kind, MessageEntityKind::BotCommand);
    }

    #[test]
    fn non_text_updates_still_parse() {
        let update: Update = serde_json::from_str(r#"{
            "update_id": 8,
            "message": {
                "message_id": 3,
                "date": 1700000000,
                "chat": {"id": -100, "type": "supergroup", "title": "Music"},
                "photo": [{"file_id": "p", "file_unique_id": "u", "width": 1, "height": 1}],
                "entities": [{"type": "url", "offset": 0, "length": 5}]
            }
        }"#).unwrap();
        let msg = update.message.unwrap();
        assert!(msg.text.is_none());
        assert_eq!(msg.entities[0].kind, MessageEntityKind::Other);

        let update: Update = serde_json::from_str(r#"{"update_id": 9, "edited_message": {}}"#).unwrap();
        assert!(update.message.is_none() && update.callback_query.is_none());
    }

    #[test]
    fn callback_query_update() {
        let update: Update = serde_json::from_str(r#"{
            "update_id": 10,
            "callback_query": {
                "id": "q1",
                "from": {"id": 5, "is_bot": false, "first_name": "Bo"},
                "message": {
                    "message_id": 77, "date": 0,
                    "chat": {"id": 5, "type": "private"}
                },
                "chat_instance": "ci",
                "data": "abc"
            }
        }"#).unwrap();
        assert_eq!(update.from().unwrap().id, 5);
        let query = update.callback_query.unwrap();
        assert_eq!(&*query.id, "q1");
        assert_eq!(query.data.as_deref(), Some("abc"));
        assert_eq!(query.message.unwrap().id, 77);
    }

    #[test]
    fn optional_fields_are_omitted() {
        let json = serde_json::to_value(SendMessage { chat_id: 1, text: "hi", ..Default::default() }).unwrap();
        assert_eq!(json, serde_json::json!({"chat_id": 1, "text": "hi"}));

        let markup = InlineKeyboardMarkup {
            inline_keyboard: vec![[InlineKeyboardButton { text: "Get", callback_data: "id1" }]],
        };
        let json = serde_json::to_value(SendMessage {
            chat_id: 1,
            text: "hi",
            reply_markup: Some(&markup),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(json["reply_markup"]["inline_keyboard"][0][0]["callback_data"], "id1");
    }

    #[test]
    fn api_errors_name_the_method() {
        let response: TelegramResponse<bool> =
            serde_json::from_str(r#"{"ok": false, "error_code": 400, "description": "Bad Request: chat not found"}"#)
                .unwrap();
        let err = response.into_result(SendMessage::NAME).unwrap_err();
        assert_eq!(err.to_string(), "SendMessage: Telegram API error: Bad Request: chat not found");
    }

    #[test]
    fn edit_responses_of_either_shape_are_accepted() {
        for body in [
            r#"{"ok": true, "result": true}"#,
            r#"{"ok": true, "result": {"message_id": 1, "date": 0, "chat": {"id": 1, "type": "private"}}}"#,
        ] {
            let response: TelegramResponse<<EditMessageText as Request>::Response> =
                serde_json::from_str(body).unwrap();
            assert!(response.into_result(EditMessageText::NAME).is_ok());
        }
    }
}
