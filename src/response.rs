//! Types for EPP responses (RFC 5730 §2.6).
//!
//! `djc-instant-epp`'s response types were tied to `instant-xml`'s
//! compile-time-fixed schema; here the same shapes are rebuilt over
//! [`Element`], so a `<resData>`/`<extension>` payload a caller-supplied
//! handler produced can be spliced in without this crate knowing its
//! schema. `ValueElement`'s job — capturing an arbitrary `##any` child
//! verbatim — is now simply what [`Element`] already does.

use chrono::{DateTime, Utc};

use crate::result::ResultCode;
use crate::xml::{Element, FromElement, ToElement, XmlError};

/// The `<result>` block of a response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EppResult {
    pub code: ResultCode,
    pub message: String,
    /// Captured children of zero or more `<value>` tags (`errValueType`,
    /// RFC 5730 §2.6: `##any` content, opaque to this crate).
    pub values: Vec<Element>,
    pub ext_values: Vec<ExtValue>,
}

impl EppResult {
    /// A minimal result carrying only a code and its canonical message.
    pub fn new(code: ResultCode) -> Self {
        EppResult {
            code,
            message: code.message().to_string(),
            values: Vec::new(),
            ext_values: Vec::new(),
        }
    }

    /// A result with a free-form reason attached under `extValue`.
    pub fn with_reason(code: ResultCode, reason: impl Into<String>) -> Self {
        let mut result = Self::new(code);
        result.ext_values.push(ExtValue {
            value: Element::new("value"),
            reason: Reason {
                lang: None,
                text: reason.into(),
            },
        });
        result
    }
}

/// The `<extValue>` block: a captured `<value>` plus a human-readable reason.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtValue {
    pub value: Element,
    pub reason: Reason,
}

/// The `<reason>` block inside an `<extValue>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reason {
    /// Defaults to `"en"` when absent, per RFC 5730 §2.6.
    pub lang: Option<String>,
    pub text: String,
}

/// The `<trID>` block: client and server transaction identifiers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseTrId {
    pub client_tr_id: Option<String>,
    pub server_tr_id: String,
}

/// The `<msgQ>` block: pending-message queue status returned by `poll`.
#[derive(Clone, Debug, PartialEq)]
pub struct MessageQueue {
    pub count: u32,
    pub id: String,
    pub date: Option<DateTime<Utc>>,
    pub message: Option<Message>,
}

/// The `<msg>` block nested inside `<msgQ>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub lang: Option<String>,
    pub text: String,
}

/// A full `<response>` document.
///
/// `res_data` and `extension` are opaque element trees: the business
/// payload inside them is produced and consumed entirely by the
/// caller-supplied handler that the router dispatched to.
#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    pub result: EppResult,
    pub message_queue: Option<MessageQueue>,
    pub res_data: Option<Element>,
    pub extension: Option<Element>,
    pub tr_ids: ResponseTrId,
}

/// A non-success outcome reported back to a [`crate::client::Client`] caller,
/// e.g. via [`crate::error::Error::Command`].
#[derive(Clone, Debug, PartialEq)]
pub struct ResponseStatus {
    pub result: EppResult,
    pub tr_ids: ResponseTrId,
}

impl ToElement for Response {
    fn to_element(&self) -> Element {
        Element::new("response")
            .child(self.result.to_element())
            .maybe_child(self.message_queue.as_ref().map(|q| q.to_element()))
            .maybe_child(self.res_data.as_ref().map(|data| {
                Element::new("resData").child(data.clone())
            }))
            .maybe_child(self.extension.as_ref().map(|ext| {
                Element::new("extension").child(ext.clone())
            }))
            .child(self.tr_ids.to_element())
    }
}

impl FromElement for Response {
    fn from_element(el: &Element) -> Result<Self, XmlError> {
        let result = el
            .find(None, "result")
            .ok_or_else(|| XmlError::Missing("result".to_string()))
            .and_then(EppResult::from_element)?;
        let message_queue = el.find(None, "msgQ").map(MessageQueue::from_element).transpose()?;
        let res_data = el
            .find(None, "resData")
            .and_then(|rd| rd.child_elements().next())
            .cloned();
        let extension = el
            .find(None, "extension")
            .and_then(|ext| ext.child_elements().next())
            .cloned();
        let tr_ids = el
            .find(None, "trID")
            .ok_or_else(|| XmlError::Missing("trID".to_string()))
            .and_then(ResponseTrId::from_element)?;

        Ok(Response {
            result,
            message_queue,
            res_data,
            extension,
            tr_ids,
        })
    }
}

impl ToElement for EppResult {
    fn to_element(&self) -> Element {
        Element::new("result")
            .attr("code", self.code.code().to_string())
            .child(Element::new("msg").text(self.message.clone()))
            .children(self.values.iter().cloned().map(|v| Element::new("value").child(v)))
            .children(self.ext_values.iter().map(ExtValue::to_element))
    }
}

impl FromElement for EppResult {
    fn from_element(el: &Element) -> Result<Self, XmlError> {
        let code = el
            .attr_value("code")
            .ok_or_else(|| XmlError::Missing("result/@code".to_string()))?
            .parse::<u16>()
            .map_err(|_| XmlError::Unexpected("result/@code is not an integer".to_string()))?;
        let code = ResultCode::from_code(code)
            .ok_or_else(|| XmlError::Unexpected(format!("unknown result code {code}")))?;
        let message = el
            .find(None, "msg")
            .and_then(Element::text_content)
            .ok_or_else(|| XmlError::Missing("result/msg".to_string()))?;
        let values = el
            .child_elements()
            .filter(|c| c.name == "value")
            .filter_map(|v| v.child_elements().next().cloned())
            .collect();
        let ext_values = el
            .child_elements()
            .filter(|c| c.name == "extValue")
            .map(ExtValue::from_element)
            .collect::<Result<_, _>>()?;

        Ok(EppResult {
            code,
            message,
            values,
            ext_values,
        })
    }
}

impl ExtValue {
    fn to_element(&self) -> Element {
        Element::new("extValue")
            .child(Element::new("value").child(self.value.clone()))
            .child(self.reason.to_element())
    }

    fn from_element(el: &Element) -> Result<Self, XmlError> {
        let value = el
            .find(None, "value")
            .and_then(|v| v.child_elements().next())
            .cloned()
            .ok_or_else(|| XmlError::Missing("extValue/value".to_string()))?;
        let reason = el
            .find(None, "reason")
            .ok_or_else(|| XmlError::Missing("extValue/reason".to_string()))
            .and_then(Reason::from_element)?;
        Ok(ExtValue { value, reason })
    }
}

impl Reason {
    fn to_element(&self) -> Element {
        let mut el = Element::new("reason");
        if let Some(lang) = &self.lang {
            el = el.attr("lang", lang.clone());
        }
        el.text(self.text.clone())
    }

    fn from_element(el: &Element) -> Result<Self, XmlError> {
        Ok(Reason {
            lang: el.attr_value("lang").map(str::to_string),
            text: el.text_content().unwrap_or_default(),
        })
    }
}

impl ToElement for ResponseTrId {
    fn to_element(&self) -> Element {
        Element::new("trID")
            .maybe_child(
                self.client_tr_id
                    .as_ref()
                    .map(|id| Element::new("clTRID").text(id.clone())),
            )
            .child(Element::new("svTRID").text(self.server_tr_id.clone()))
    }
}

impl FromElement for ResponseTrId {
    fn from_element(el: &Element) -> Result<Self, XmlError> {
        let client_tr_id = el.find(None, "clTRID").and_then(Element::text_content);
        let server_tr_id = el
            .find(None, "svTRID")
            .and_then(Element::text_content)
            .ok_or_else(|| XmlError::Missing("trID/svTRID".to_string()))?;
        Ok(ResponseTrId {
            client_tr_id,
            server_tr_id,
        })
    }
}

impl ToElement for MessageQueue {
    fn to_element(&self) -> Element {
        Element::new("msgQ")
            .attr("count", self.count.to_string())
            .attr("id", self.id.clone())
            .maybe_child(
                self.date
                    .map(|d| Element::new("qDate").text(d.to_rfc3339())),
            )
            .maybe_child(self.message.as_ref().map(Message::to_element))
    }
}

impl FromElement for MessageQueue {
    fn from_element(el: &Element) -> Result<Self, XmlError> {
        let count = el
            .attr_value("count")
            .ok_or_else(|| XmlError::Missing("msgQ/@count".to_string()))?
            .parse()
            .map_err(|_| XmlError::Unexpected("msgQ/@count is not an integer".to_string()))?;
        let id = el
            .attr_value("id")
            .ok_or_else(|| XmlError::Missing("msgQ/@id".to_string()))?
            .to_string();
        let date = el
            .find(None, "qDate")
            .and_then(Element::text_content)
            .map(|s| DateTime::parse_from_rfc3339(&s).map(|d| d.with_timezone(&Utc)))
            .transpose()
            .map_err(|_| XmlError::Unexpected("msgQ/qDate is not a valid timestamp".to_string()))?;
        let message = el.find(None, "msg").map(Message::from_element).transpose()?;

        Ok(MessageQueue {
            count,
            id,
            date,
            message,
        })
    }
}

impl Message {
    fn to_element(&self) -> Element {
        let mut el = Element::new("msg");
        if let Some(lang) = &self.lang {
            el = el.attr("lang", lang.clone());
        }
        el.text(self.text.clone())
    }

    fn from_element(el: &Element) -> Result<Self, XmlError> {
        Ok(Message {
            lang: el.attr_value("lang").map(str::to_string),
            text: el.text_content().unwrap_or_default(),
        })
    }
}

impl std::fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (svTRID={})",
            self.result.code, self.tr_ids.server_tr_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_round_trips_through_element() {
        let result = EppResult::with_reason(ResultCode::SyntaxError, "bad element order");
        let el = result.to_element();
        let back = EppResult::from_element(&el).unwrap();
        assert_eq!(back.code, ResultCode::SyntaxError);
        assert_eq!(back.ext_values.len(), 1);
        assert_eq!(back.ext_values[0].reason.text, "bad element order");
    }

    #[test]
    fn response_round_trips_with_res_data() {
        let response = Response {
            result: EppResult::new(ResultCode::CompletedSuccessfully),
            message_queue: None,
            res_data: Some(Element::with_ns("chkData", "urn:ietf:params:xml:ns:domain-1.0")),
            extension: None,
            tr_ids: ResponseTrId {
                client_tr_id: Some("ABC-123".to_string()),
                server_tr_id: "srv-987".to_string(),
            },
        };
        let el = response.to_element();
        let back = Response::from_element(&el).unwrap();
        assert_eq!(back.tr_ids.server_tr_id, "srv-987");
        assert_eq!(
            back.res_data.unwrap().ns.as_deref(),
            Some("urn:ietf:params:xml:ns:domain-1.0")
        );
    }

    #[test]
    fn message_queue_round_trips() {
        let queue = MessageQueue {
            count: 5,
            id: "12345".to_string(),
            date: None,
            message: Some(Message {
                lang: None,
                text: "5 messages pending".to_string(),
            }),
        };
        let el = queue.to_element();
        let back = MessageQueue::from_element(&el).unwrap();
        assert_eq!(back.count, 5);
        assert_eq!(back.message.unwrap().text, "5 messages pending");
    }
}
