//! `http` module
//!
//! ```lua
//! local http = require("http")
//! local resp, err = http.get({ url = "https://example.com/index.json" })
//! -- resp.status_code, resp.headers, resp.body, resp.content_length
//! local err = http.download_file({ url = "https://example.com/a.tgz" }, "/tmp/a.tgz")
//! ```

use std::collections::HashMap;
use std::fs::File;

use mlua::{Lua, MultiValue, Table, Value};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{CONTENT_LENGTH, USER_AGENT};
use reqwest::Method;

use super::failure;
use crate::globals::{Navigator, NAVIGATOR};
use crate::{Marshal, Unmarshal};

pub const MODULE: &str = "http";

#[derive(Debug, Default, Unmarshal)]
struct RequestParams {
    url: String,
    headers: HashMap<String, String>,
}

#[derive(Debug, Default, Marshal)]
struct ResponseTable {
    status_code: u16,
    headers: HashMap<String, String>,
    body: Option<String>,
    content_length: i64,
}

pub fn module(lua: &Lua, proxy: Option<&str>) -> mlua::Result<Table> {
    let client = build_client(proxy).map_err(mlua::Error::external)?;
    let module = lua.create_table()?;

    let get_client = client.clone();
    module.set(
        "get",
        lua.create_function(move |lua, params: Value| {
            fetch(lua, &get_client, Method::GET, &params)
        })?,
    )?;

    let head_client = client.clone();
    module.set(
        "head",
        lua.create_function(move |lua, params: Value| {
            fetch(lua, &head_client, Method::HEAD, &params)
        })?,
    )?;

    module.set(
        "download_file",
        lua.create_function(move |lua, (params, path): (Value, Option<String>)| {
            download(lua, &client, &params, path.unwrap_or_default())
        })?,
    )?;

    Ok(module)
}

fn build_client(proxy: Option<&str>) -> reqwest::Result<Client> {
    let mut builder = Client::builder();
    if let Some(url) = proxy.filter(|url| !url.is_empty()) {
        tracing::debug!(target: "vfox::http", proxy = %url, "using proxy");
        builder = builder.proxy(reqwest::Proxy::all(url)?);
    }
    builder.build()
}

fn read_params(params: &Value) -> Result<RequestParams, String> {
    let mut request = RequestParams::default();
    request.unmarshal(params).map_err(|e| e.to_string())?;
    if request.url.is_empty() {
        return Err("url is required".to_string());
    }
    Ok(request)
}

fn prepare(lua: &Lua, client: &Client, method: Method, params: &RequestParams) -> RequestBuilder {
    let mut builder = client.request(method, &params.url);
    let mut has_agent = false;
    for (name, value) in &params.headers {
        has_agent |= name.eq_ignore_ascii_case(USER_AGENT.as_str());
        builder = builder.header(name, value);
    }
    if !has_agent {
        if let Some(agent) = user_agent(lua) {
            builder = builder.header(USER_AGENT, agent);
        }
    }
    builder
}

/// The user agent from the `NAVIGATOR` global, once it has been injected
fn user_agent(lua: &Lua) -> Option<String> {
    let value: Value = lua.globals().get(NAVIGATOR).ok()?;
    let mut navigator = Navigator::default();
    navigator.unmarshal(&value).ok()?;
    Some(navigator.user_agent).filter(|agent| !agent.is_empty())
}

fn response_headers(response: &Response) -> HashMap<String, String> {
    response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.to_string(), value.to_string()))
        })
        .collect()
}

fn content_length(response: &Response) -> i64 {
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
        .or_else(|| response.content_length().map(|n| n as i64))
        .unwrap_or(-1)
}

fn fetch(lua: &Lua, client: &Client, method: Method, params: &Value) -> mlua::Result<MultiValue> {
    let params = match read_params(params) {
        Ok(params) => params,
        Err(message) => return failure(lua, message),
    };
    tracing::debug!(target: "vfox::http", %method, url = %params.url, "request");

    let response = match prepare(lua, client, method.clone(), &params).send() {
        Ok(response) => response,
        Err(e) => return failure(lua, e),
    };

    let mut table = ResponseTable {
        status_code: response.status().as_u16(),
        headers: response_headers(&response),
        content_length: content_length(&response),
        body: None,
    };
    if method != Method::HEAD {
        match response.text() {
            Ok(body) => table.body = Some(body),
            Err(e) => return failure(lua, e),
        }
    }

    let value = table.marshal(lua).map_err(mlua::Error::external)?;
    Ok(MultiValue::from_vec(vec![value]))
}

fn download(lua: &Lua, client: &Client, params: &Value, path: String) -> mlua::Result<MultiValue> {
    if path.is_empty() {
        return error_only(lua, "filepath is required");
    }
    let params = match read_params(params) {
        Ok(params) => params,
        Err(message) => return error_only(lua, &message),
    };
    tracing::debug!(target: "vfox::http", url = %params.url, %path, "download");

    let mut response = match prepare(lua, client, Method::GET, &params).send() {
        Ok(response) => response,
        Err(e) => return error_only(lua, &e.to_string()),
    };
    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return error_only(lua, "file not found");
    }
    if !response.status().is_success() {
        return error_only(lua, &format!("unexpected status code {}", response.status()));
    }

    let mut file = match File::create(&path) {
        Ok(file) => file,
        Err(e) => return error_only(lua, &e.to_string()),
    };
    if let Err(e) = response.copy_to(&mut file) {
        return error_only(lua, &e.to_string());
    }
    Ok(MultiValue::new())
}

/// `download_file` reports failure as its only return value
fn error_only(lua: &Lua, message: &str) -> mlua::Result<MultiValue> {
    Ok(MultiValue::from_vec(vec![Value::String(
        lua.create_string(message)?,
    )]))
}
