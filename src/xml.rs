//! 응답 XML 트리: roxmltree로 파싱한 뒤 소유형 [`Element`] 트리로 변환합니다.
//!
//! ## 구성
//!
//! - [`ParseOptions`]: 파싱 전 정규화 (CR/LF/TAB 제거, `<BR/>` 이스케이프)
//! - [`parse`]: 본문 → 루트 [`Element`]
//! - [`Element::visit`]: 전위 순회 방문자. 트리 덤프, 리포트 이름, 선택지 수집이 모두 이것을 사용합니다.

use serde::Deserialize;

use crate::error::Result;
use crate::format::format_field_value;
use crate::schema::Schema;

/// 파싱 전 응답 본문 정규화 옵션 (모두 기본 활성)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// `\r` 제거
    pub ignore_cr: bool,
    /// `\n` 제거
    pub ignore_lf: bool,
    /// `\t` 제거
    pub ignore_tab: bool,
    /// 값 안에 들어온 `<BR/>`를 텍스트로 이스케이프
    pub escape_br: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            ignore_cr: true,
            ignore_lf: true,
            ignore_tab: true,
            escape_br: true,
        }
    }
}

impl ParseOptions {
    /// 정규화를 모두 끈 옵션
    pub fn raw() -> Self {
        Self {
            ignore_cr: false,
            ignore_lf: false,
            ignore_tab: false,
            escape_br: false,
        }
    }

    /// 본문에 정규화를 적용합니다.
    pub fn normalize(&self, body: &str) -> String {
        let mut text: String = body
            .chars()
            .filter(|c| {
                !((self.ignore_cr && *c == '\r')
                    || (self.ignore_lf && *c == '\n')
                    || (self.ignore_tab && *c == '\t'))
            })
            .collect();
        if self.escape_br {
            text = text.replace("<BR/>", "&lt;BR/&gt;");
        }
        text
    }
}

/// 소유형 XML 엘리먼트
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    /// 직접 자식 텍스트 노드를 이어 붙인 값. 자식 엘리먼트만 있고 공백뿐이면 `None`.
    pub text: Option<String>,
    pub children: Vec<Element>,
}

/// 응답 본문을 정규화한 뒤 파싱하여 루트 엘리먼트를 반환합니다.
///
/// # 에러
///
/// - [`QdbError::Xml`](crate::error::QdbError::Xml): 올바른 XML이 아님
pub fn parse(body: &str, options: &ParseOptions) -> Result<Element> {
    let text = options.normalize(body);
    let parsing = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    };
    let doc = roxmltree::Document::parse_with_options(&text, parsing)?;
    Ok(Element::from_node(doc.root_element()))
}

impl Element {
    /// 이름만 있는 빈 엘리먼트
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    fn from_node(node: roxmltree::Node<'_, '_>) -> Self {
        let children: Vec<Element> = node
            .children()
            .filter(|n| n.is_element())
            .map(Element::from_node)
            .collect();

        let raw: String = node
            .children()
            .filter(|n| n.is_text())
            .filter_map(|n| n.text())
            .collect();
        let text = if raw.is_empty() || (!children.is_empty() && raw.trim().is_empty()) {
            None
        } else {
            Some(raw)
        };

        Self {
            name: node.tag_name().name().to_string(),
            attributes: node
                .attributes()
                .map(|a| (a.name().to_string(), a.value().to_string()))
                .collect(),
            text,
            children,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// 텍스트, 없으면 빈 문자열
    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// 이름이 같은 첫 직접 자식
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// 이름이 같은 직접 자식 전체
    pub fn children_named<'a, 'n>(&'a self, name: &'n str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// 첫 직접 자식의 텍스트
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).and_then(Element::text)
    }

    /// `/` 또는 `.`으로 구분한 상대 경로에 해당하는 모든 엘리먼트 (문서 순서)
    ///
    /// # 예시
    ///
    /// ```
    /// use qdbapi::xml::{parse, ParseOptions};
    ///
    /// let root = parse("<r><a><b>1</b></a><a><b>2</b></a></r>", &ParseOptions::default()).unwrap();
    /// let texts: Vec<_> = root.select("a/b").iter().filter_map(|e| e.text()).collect();
    /// assert_eq!(texts, vec!["1", "2"]);
    /// assert_eq!(root.select("a.b").len(), 2);
    /// ```
    pub fn select(&self, path: &str) -> Vec<&Element> {
        let mut current = vec![self];
        for segment in path.split(['/', '.']).filter(|s| !s.is_empty()) {
            current = current
                .into_iter()
                .flat_map(|e| e.children_named(segment))
                .collect();
            if current.is_empty() {
                break;
            }
        }
        current
    }

    /// 경로에 해당하는 첫 엘리먼트
    pub fn select_first(&self, path: &str) -> Option<&Element> {
        self.select(path).into_iter().next()
    }

    /// 전위 순회(부모 먼저)로 자신과 모든 자손을 방문합니다.
    ///
    /// `leaf_only`이면 자식이 없는 엘리먼트만 방문합니다. 콜백은 (엘리먼트, 깊이)를 받습니다.
    pub fn visit<'a, F>(&'a self, leaf_only: bool, f: &mut F)
    where
        F: FnMut(&'a Element, usize),
    {
        self.visit_at(0, leaf_only, f);
    }

    fn visit_at<'a, F>(&'a self, depth: usize, leaf_only: bool, f: &mut F)
    where
        F: FnMut(&'a Element, usize),
    {
        if !leaf_only || self.children.is_empty() {
            f(self, depth);
        }
        for child in &self.children {
            child.visit_at(depth + 1, leaf_only, f);
        }
    }

    /// 자손 중 `name` 엘리먼트의 텍스트를 문서 순서로 모읍니다.
    pub fn descendant_texts(&self, name: &str) -> Vec<String> {
        let mut texts = Vec::new();
        self.visit(true, &mut |e, _| {
            if e.name == name {
                if let Some(text) = e.text() {
                    texts.push(text.to_string());
                }
            }
        });
        texts
    }

    /// 이름과 속성 값이 일치하는 첫 자손 (자신 포함)
    pub fn find_by_attribute_value(&self, name: &str, attr: &str, value: &str) -> Option<&Element> {
        self.find_all_by_attribute_value(name, attr, value)
            .into_iter()
            .next()
    }

    /// 이름과 속성 값이 일치하는 모든 자손 (자신 포함)
    pub fn find_all_by_attribute_value(&self, name: &str, attr: &str, value: &str) -> Vec<&Element> {
        let mut found = Vec::new();
        self.visit(false, &mut |e, _| {
            if e.name == name && e.attr(attr) == Some(value) {
                found.push(e);
            }
        });
        found
    }

    /// 이름이 같고 해당 속성을 가진 모든 자손 (자신 포함)
    pub fn find_all_by_attribute_name(&self, name: &str, attr: &str) -> Vec<&Element> {
        let mut found = Vec::new();
        self.visit(false, &mut |e, _| {
            if e.name == name && e.attr(attr).is_some() {
                found.push(e);
            }
        });
        found
    }

    /// 들여쓰기 트리 문자열 (디버깅용)
    ///
    /// 스키마가 주어지면 `<f id="N">`의 이름을 필드 라벨로 바꾸고 값을 필드 타입에 맞춰 포맷합니다.
    /// 텍스트 없는 리프는 생략합니다.
    pub fn to_tree_string(&self, schema: Option<&Schema>) -> String {
        let mut out = String::new();
        self.visit(false, &mut |e, depth| {
            let indent = " ".repeat(depth);
            let field = schema.and_then(|s| {
                e.attr("id")
                    .filter(|_| e.name == "f" || e.name == "field")
                    .and_then(|id| id.parse::<u32>().ok())
                    .and_then(|fid| s.field_by_id(fid))
            });
            let name = field.map_or(e.name.as_str(), |f| f.label.as_str());
            let attrs = e
                .attributes
                .iter()
                .map(|(k, v)| format!("{k}=\"{v}\""))
                .collect::<Vec<_>>()
                .join(" ");

            if e.has_children() {
                out.push_str(&format!("{indent}{name} {attrs}:\n"));
            } else if let Some(text) = e.text() {
                let value = match field {
                    Some(f) => format_field_value(text, &f.field_type, &f.format_options()),
                    None => text.to_string(),
                };
                out.push_str(&format!("{indent}{name} {attrs} = {value}\n"));
            }
        });
        out
    }
}
