use axum::response::{IntoResponse, Redirect, Response};
use url::form_urlencoded;

/// 资料页（上传完成后的跳转目标）
pub const PROFILE_PAGE_ROUTE: &str = "/page/studentProfilePage";
/// 头像上传回调
pub const PICTURE_UPLOAD_ROUTE: &str = "/page/studentProfilePictureUpload";
/// 当前用户头像
pub const PROFILE_PICTURE_ROUTE: &str = "/students/profilePic";

/// 跳转参数：前端打开头像编辑面板
pub const PARAM_EDIT_PHOTO: &str = "editphoto";
const PARAM_ERROR: &str = "error";
const PARAM_MESSAGE: &str = "message";

/// 跳转结果：目标地址 + 附加参数 + 给用户的提示
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectResult {
    destination: String,
    params: Vec<(String, String)>,
    statuses: Vec<String>,
    is_error: bool,
}

impl RedirectResult {
    pub fn to(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            params: Vec::new(),
            statuses: Vec::new(),
            is_error: false,
        }
    }

    pub fn add_param(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.params.push((name.into(), value.into()));
    }

    pub fn with_statuses(mut self, statuses: Vec<String>, is_error: bool) -> Self {
        self.statuses = statuses;
        self.is_error = is_error;
        self
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn statuses(&self) -> &[String] {
        &self.statuses
    }

    pub fn is_error(&self) -> bool {
        self.is_error
    }

    /// 拼出 Location：参数、错误标记与提示都以查询串携带
    pub fn location(&self) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        for (k, v) in &self.params {
            query.append_pair(k, v);
        }
        if self.is_error {
            query.append_pair(PARAM_ERROR, "true");
        }
        for status in &self.statuses {
            query.append_pair(PARAM_MESSAGE, status);
        }
        let query = query.finish();
        if query.is_empty() {
            self.destination.clone()
        } else {
            format!("{}?{}", self.destination, query)
        }
    }
}

impl IntoResponse for RedirectResult {
    fn into_response(self) -> Response {
        Redirect::to(&self.location()).into_response()
    }
}

/// 资料页从查询串还原的提示
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageNotice {
    pub messages: Vec<String>,
    pub is_error: bool,
    pub edit_photo: bool,
}

impl PageNotice {
    pub fn from_query(query: Option<&str>) -> Self {
        let mut notice = Self::default();
        let Some(query) = query else {
            return notice;
        };
        for (k, v) in form_urlencoded::parse(query.as_bytes()) {
            match k.as_ref() {
                PARAM_MESSAGE => notice.messages.push(v.into_owned()),
                PARAM_ERROR => notice.is_error = v == "true",
                PARAM_EDIT_PHOTO => notice.edit_photo = v == "true",
                _ => {}
            }
        }
        notice
    }
}
