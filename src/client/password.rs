//! Password/cookie client that reads a knowledge base through the web app.
//!
//! The web app has no public token API for this flow, so the client keeps a
//! cookie [`Session`] and reads the repository page, the internal document
//! list endpoint and the markdown export. Authentication happens in
//! [`PasswordClient::login`]:
//!
//! 1. A configured browser cookie is adopted without any request.
//! 2. Otherwise a username/password pair is sent to the mobile login endpoint.
//! 3. When a repository password is configured, the repository page is
//!    unlocked by submitting its password form.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{COOKIE, ORIGIN, REFERER, USER_AGENT};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;
use tracing::{debug, info, instrument};
use url::Url;

use crate::auth::{PasswordEncryptor, RsaPasswordEncryptor, Session};
use crate::catalog::{BreadcrumbMode, Catalog};
use crate::config::PasswordConfig;
use crate::error::YuqueError;
use crate::http::{MOBILE_USER_AGENT, TextResponse, api_error, build_http_client};
use crate::model::{ApiEnvelope, CatalogEntry, DocDetail, DocSummary};
use crate::pipeline::{DetailFetcher, DocSink, PipelineOptions, fetch_details};
use crate::properties::split_properties;
use crate::scrape::{PageInspector, PasswordForm, RegexPageInspector};
use crate::transform::{DocumentTransform, IdentityTransform};

const LOGIN_PATH: &str = "api/mobile_app/accounts/login?language=zh-cn";
const LOGIN_REFERER_SUFFIX: &str = "/login?goto=https%3A%2F%2Fwww.yuque.com%2Fdashboard";
const DEFAULT_PASSWORD_FIELD: &str = "password";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    login: &'a str,
    password: String,
    login_type: &'static str,
}

/// Client for one knowledge base, authenticated by web session.
pub struct PasswordClient {
    config: PasswordConfig,
    http: Client,
    host: String,
    namespace: String,
    session: Session,
    book_id: Option<String>,
    catalog: Catalog,
    docs: Vec<DocSummary>,
    inspector: Arc<dyn PageInspector>,
    encryptor: Option<Arc<dyn PasswordEncryptor>>,
    transform: Arc<dyn DocumentTransform>,
}

impl fmt::Debug for PasswordClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordClient")
            .field("host", &self.host)
            .field("namespace", &self.namespace)
            .field("session", &self.session)
            .field("book_id", &self.book_id)
            .field("catalog_entries", &self.catalog.len())
            .finish_non_exhaustive()
    }
}

impl PasswordClient {
    /// Creates a client from a resolved config.
    ///
    /// A configured login public key is parsed here so a bad key fails before
    /// any request is made.
    ///
    /// # Errors
    ///
    /// Returns [`YuqueError::MissingConfig`] for a missing namespace, when no
    /// cookie, repository password or username/password pair is configured, or
    /// for an invalid public key. Returns [`YuqueError::ClientBuild`] when the
    /// HTTP client cannot be built.
    pub fn new(config: PasswordConfig) -> Result<Self, YuqueError> {
        config.validate_credentials()?;
        let encryptor = config
            .login_public_key
            .as_deref()
            .map(RsaPasswordEncryptor::from_public_key_pem)
            .transpose()?
            .map(|encryptor| Arc::new(encryptor) as Arc<dyn PasswordEncryptor>);

        Ok(Self {
            http: build_http_client(false)?,
            host: config.host(),
            namespace: config.namespace(),
            session: Session::new(),
            book_id: None,
            catalog: Catalog::default(),
            docs: Vec::new(),
            inspector: Arc::new(RegexPageInspector),
            encryptor,
            transform: Arc::new(IdentityTransform),
            config,
        })
    }

    /// Replaces the page inspector.
    #[must_use]
    pub fn with_inspector(mut self, inspector: Arc<dyn PageInspector>) -> Self {
        self.inspector = inspector;
        self
    }

    /// Replaces the password encryptor.
    #[must_use]
    pub fn with_encryptor(mut self, encryptor: Arc<dyn PasswordEncryptor>) -> Self {
        self.encryptor = Some(encryptor);
        self
    }

    /// Replaces the body transform.
    #[must_use]
    pub fn with_transform(mut self, transform: Arc<dyn DocumentTransform>) -> Self {
        self.transform = transform;
        self
    }

    /// Returns `login/repo`.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the current session.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Returns the internal book id read by the last [`PasswordClient::toc`].
    #[must_use]
    pub fn book_id(&self) -> Option<&str> {
        self.book_id.as_deref()
    }

    /// Returns the catalog loaded by the last [`PasswordClient::toc`] call.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn repo_url(&self) -> String {
        format!("{}/{}", self.host, self.namespace)
    }

    fn with_cookie(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.cookie_header() {
            Some(cookie) => request.header(COOKIE, cookie),
            None => request,
        }
    }

    fn require_session(&self) -> Result<&str, YuqueError> {
        self.session.cookie_header().ok_or(YuqueError::NotLoggedIn)
    }

    async fn send(url: &str, request: RequestBuilder) -> Result<TextResponse, YuqueError> {
        debug!(url, "sending request");
        let response = request
            .send()
            .await
            .map_err(|error| YuqueError::network(url, error))?;
        TextResponse::read(url, response).await
    }

    /// GETs `url` with the session cookie, which must exist.
    async fn get_authenticated(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<TextResponse, YuqueError> {
        let cookie = self.require_session()?;
        let request = self.http.get(url).header(COOKIE, cookie).query(query);
        Self::send(url, request).await
    }

    /// Establishes the session.
    ///
    /// # Errors
    ///
    /// Returns [`YuqueError::LoginFailed`] when the account login is rejected,
    /// [`YuqueError::MissingConfig`] when the password cannot be encrypted for
    /// lack of a key, and [`YuqueError::RepoUnlockFailed`] when the repository
    /// password does not unlock the page.
    #[instrument(skip(self), fields(namespace = %self.namespace))]
    pub async fn login(&mut self) -> Result<(), YuqueError> {
        if let Some(cookie) = self.config.cookie.clone() {
            self.session = Session::from_cookie(cookie);
            info!("using browser cookie session");
            return Ok(());
        }

        match (self.config.username.clone(), self.config.password.clone()) {
            (Some(username), Some(password)) => self.account_login(&username, &password).await?,
            _ => info!("skipping account login, using knowledge base password"),
        }

        if let Some(repo_password) = self.config.repo_password.clone() {
            self.unlock_repo(&repo_password).await?;
        }
        Ok(())
    }

    async fn account_login(&mut self, username: &str, password: &str) -> Result<(), YuqueError> {
        let encryptor = self.encryptor.as_ref().ok_or_else(|| {
            YuqueError::missing_config("username/password login requires the login public key")
        })?;
        let body = LoginRequest {
            login: username,
            password: encryptor.encrypt(password)?,
            login_type: "password",
        };

        let url = format!("{}/{LOGIN_PATH}", self.host);
        let request = self
            .http
            .post(&url)
            .header(REFERER, format!("{}{LOGIN_REFERER_SUFFIX}", self.host))
            .header(ORIGIN, &self.host)
            .header(USER_AGENT, MOBILE_USER_AGENT)
            .json(&body);
        let response = Self::send(&url, request).await?;
        if response.status != StatusCode::OK {
            return Err(YuqueError::LoginFailed {
                status: response.status.as_u16(),
                body: response.body,
            });
        }

        self.session.merge_headers(&response.headers);
        info!("account login succeeded");
        Ok(())
    }

    /// GETs the repository page, merging any cookies it sets.
    async fn fetch_repo_page(&mut self) -> Result<TextResponse, YuqueError> {
        let url = self.repo_url();
        let request = self.with_cookie(self.http.get(&url));
        let response = Self::send(&url, request).await?;
        self.session.merge_headers(&response.headers);
        Ok(response)
    }

    async fn unlock_repo(&mut self, repo_password: &str) -> Result<(), YuqueError> {
        let page = self.fetch_repo_page().await?;
        if self.inspector.inspect_book(&page.body).has_book {
            info!("knowledge base already accessible, no unlock needed");
            return Ok(());
        }

        let form = self.inspector.find_password_form(&page.body).ok_or_else(|| {
            YuqueError::repo_unlock("password form not found, the page layout may have changed")
        })?;
        self.submit_password_form(&form, repo_password).await?;

        let verify = self.fetch_repo_page().await?;
        if !self.inspector.inspect_book(&verify.body).has_book {
            return Err(YuqueError::repo_unlock(
                "knowledge base still locked, check YUQUE_REPO_PASSWORD",
            ));
        }
        info!("knowledge base password accepted");
        Ok(())
    }

    async fn submit_password_form(
        &mut self,
        form: &PasswordForm,
        repo_password: &str,
    ) -> Result<(), YuqueError> {
        let mut fields = form.hidden_fields.clone();
        let password_field = form
            .password_field
            .clone()
            .unwrap_or_else(|| DEFAULT_PASSWORD_FIELD.to_string());
        fields.retain(|(name, _)| *name != password_field);
        fields.push((password_field, repo_password.to_string()));

        let default_action = format!("/{}", self.namespace);
        let action = form.action.as_deref().unwrap_or(&default_action);
        let action_url = resolve_action(&self.host, action)?;
        let is_get = form
            .method
            .as_deref()
            .is_some_and(|method| method.eq_ignore_ascii_case("get"));

        let request = if is_get {
            self.http.get(&action_url).query(&fields)
        } else {
            self.http.post(&action_url).form(&fields)
        };
        let request = self
            .with_cookie(request)
            .header(REFERER, self.repo_url())
            .header(ORIGIN, &self.host);

        debug!(action = %action_url, get = is_get, fields = fields.len(), "submitting knowledge base password");
        let response = Self::send(&action_url, request).await?;
        self.session.merge_headers(&response.headers);
        Ok(())
    }

    /// Reads the table of contents and book id from the repository page.
    ///
    /// # Errors
    ///
    /// Returns [`YuqueError::NotLoggedIn`] without a session and
    /// [`YuqueError::StateNotFound`] when the page carries no book state.
    #[instrument(skip(self), fields(namespace = %self.namespace))]
    pub async fn toc(&mut self) -> Result<Vec<CatalogEntry>, YuqueError> {
        let url = self.repo_url();
        let page = self.get_authenticated(&url, &[]).await?;
        let state = self.inspector.inspect_book(&page.body);
        let book_id = state
            .book_id
            .filter(|_| state.has_book)
            .ok_or(YuqueError::StateNotFound { url })?;

        debug!(book_id = %book_id, entries = state.catalog.len(), "loaded catalog");
        self.book_id = Some(book_id);
        self.catalog = Catalog::new(state.catalog);
        Ok(self.catalog.entries().to_vec())
    }

    /// Fetches the document list of the book, refreshing the catalog first.
    ///
    /// # Errors
    ///
    /// Propagates [`PasswordClient::toc`] errors; non-200 list responses map to
    /// [`YuqueError::BookNotFound`] or [`YuqueError::Api`].
    #[instrument(skip(self), fields(namespace = %self.namespace))]
    pub async fn doc_list(&mut self) -> Result<Vec<DocSummary>, YuqueError> {
        self.toc().await?;
        let book_id = self.book_id.clone().unwrap_or_default();

        let url = format!("{}/api/docs", self.host);
        let response = self
            .get_authenticated(&url, &[("book_id", book_id)])
            .await?;
        if response.status != StatusCode::OK {
            return Err(api_error(&url, &self.namespace, &response));
        }
        let mut docs = response.json::<ApiEnvelope<Vec<DocSummary>>>(&url)?.data;

        let listed = docs.len();
        if self.config.only_public {
            docs.retain(DocSummary::is_public);
        }
        if self.config.only_published {
            docs.retain(DocSummary::is_published);
        }
        if docs.len() != listed {
            info!(listed, kept = docs.len(), "filtered document list by visibility");
        }

        info!(documents = docs.len(), "document list complete");
        self.docs.clone_from(&docs);
        Ok(docs)
    }

    /// Fetches one document through the markdown export.
    ///
    /// Summary fields come from the last [`PasswordClient::doc_list`] call; an
    /// unknown slug still yields a document titled by its slug.
    ///
    /// # Errors
    ///
    /// Returns [`YuqueError::NotLoggedIn`] without a session and
    /// [`YuqueError::Api`] for non-200 responses.
    pub async fn doc_detail(&self, slug: &str) -> Result<DocDetail, YuqueError> {
        let summary = self.docs.iter().find(|doc| doc.slug == slug);
        self.detail_for(slug, summary).await
    }

    #[instrument(skip(self, summary), fields(namespace = %self.namespace))]
    async fn detail_for(
        &self,
        slug: &str,
        summary: Option<&DocSummary>,
    ) -> Result<DocDetail, YuqueError> {
        let url = format!(
            "{}/{}/markdown",
            self.repo_url(),
            urlencoding::encode(slug)
        );
        let query = [
            ("attachment", "true".to_string()),
            ("latexcode", self.config.latex_code.to_string()),
            ("anchor", "false".to_string()),
            ("linebreak", self.config.linebreak.to_string()),
        ];
        let response = self.get_authenticated(&url, &query).await?;
        if response.status != StatusCode::OK {
            return Err(api_error(&url, &self.namespace, &response));
        }

        let mut detail = DocDetail::from_markdown(slug, response.body, summary);
        detail.catalog = self.catalog.breadcrumb(slug, BreadcrumbMode::Level);

        let split = split_properties(&detail.body);
        detail.properties = split.properties;
        detail.body_original.clone_from(&split.body);
        detail.body = self.transform.process_markdown(&split.body);
        detail.stamp_updated();
        Ok(detail)
    }

    /// Fetches the details of `docs` (narrowed to `ids` when non-empty).
    ///
    /// # Errors
    ///
    /// Returns the first detail fetch error.
    pub async fn doc_detail_list(
        &self,
        docs: &[DocSummary],
        ids: &[String],
        sink: Option<&dyn DocSink>,
    ) -> Result<Vec<DocDetail>, YuqueError> {
        let options = PipelineOptions {
            limit: self.config.limit(),
            illegal_formats: self.config.illegal_formats(),
        };
        fetch_details(self, docs, ids, &options, sink).await
    }
}

#[async_trait]
impl DetailFetcher for PasswordClient {
    async fn fetch_detail(&self, summary: &DocSummary) -> Result<DocDetail, YuqueError> {
        self.detail_for(&summary.slug, Some(summary)).await
    }
}

/// Resolves a form `action` against the host root.
fn resolve_action(host: &str, action: &str) -> Result<String, YuqueError> {
    Url::parse(&format!("{host}/"))
        .and_then(|base| base.join(action))
        .map(String::from)
        .map_err(|error| YuqueError::repo_unlock(format!("invalid form action {action:?}: {error}")))
}
