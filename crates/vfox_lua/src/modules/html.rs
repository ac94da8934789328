//! `html` module
//!
//! ```lua
//! local html = require("html")
//! local doc = html.parse("<ul><li>17</li><li>21</li></ul>")
//! doc:find("li"):first():text() -- "17"
//! doc:find("ul"):html()         -- "<li>17</li><li>21</li>"
//! ```
//!
//! Selections are positions into the parsed document, in document order.

use std::collections::HashSet;
use std::rc::Rc;

use mlua::{Lua, Table, UserData, UserDataMethods};
use scraper::{ElementRef, Html, Selector};

pub const MODULE: &str = "html";

pub fn module(lua: &Lua) -> mlua::Result<Table> {
    let module = lua.create_table()?;
    module.set(
        "parse",
        lua.create_function(|_, source: String| {
            Ok(Document(Rc::new(Html::parse_document(&source))))
        })?,
    )?;
    Ok(module)
}

struct Document(Rc<Html>);

impl UserData for Document {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("find", |_, this, selector: String| {
            let selector = compile(&selector)?;
            let positions = elements(&this.0)
                .iter()
                .enumerate()
                .filter(|(_, element)| selector.matches(element))
                .map(|(position, _)| position)
                .collect();
            Ok(Selection {
                document: this.0.clone(),
                positions,
            })
        });
    }
}

struct Selection {
    document: Rc<Html>,
    positions: Vec<usize>,
}

impl Selection {
    fn resolve<'a>(&self, elements: &[ElementRef<'a>]) -> Vec<ElementRef<'a>> {
        self.positions
            .iter()
            .filter_map(|&position| elements.get(position).copied())
            .collect()
    }

    /// Descendants of any selected element that match `selector`
    fn find(&self, selector: &Selector) -> Selection {
        let elements = elements(&self.document);
        let roots: HashSet<_> = self
            .resolve(&elements)
            .iter()
            .map(|element| element.id())
            .collect();
        let positions = elements
            .iter()
            .enumerate()
            .filter(|(_, element)| {
                selector.matches(element)
                    && element.ancestors().any(|ancestor| roots.contains(&ancestor.id()))
            })
            .map(|(position, _)| position)
            .collect();
        Selection {
            document: self.document.clone(),
            positions,
        }
    }

    fn first(&self) -> Selection {
        Selection {
            document: self.document.clone(),
            positions: self.positions.first().copied().into_iter().collect(),
        }
    }

    /// Combined text of every selected element
    fn text(&self) -> String {
        let elements = elements(&self.document);
        self.resolve(&elements)
            .iter()
            .flat_map(|element| element.text())
            .collect()
    }

    /// Inner HTML of the first selected element
    fn html(&self) -> String {
        let elements = elements(&self.document);
        self.resolve(&elements)
            .first()
            .map(|element| element.inner_html())
            .unwrap_or_default()
    }
}

impl UserData for Selection {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("find", |_, this, selector: String| {
            Ok(this.find(&compile(&selector)?))
        });
        methods.add_method("first", |_, this, ()| Ok(this.first()));
        methods.add_method("text", |_, this, ()| Ok(this.text()));
        methods.add_method("html", |_, this, ()| Ok(this.html()));
        methods.add_meta_method("__len", |_, this, ()| Ok(this.positions.len()));
    }
}

/// Every element of the document in document order, root included
fn elements(html: &Html) -> Vec<ElementRef<'_>> {
    html.root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .collect()
}

fn compile(selector: &str) -> mlua::Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| mlua::Error::RuntimeError(format!("invalid selector {selector:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <table id="releases">
            <tr><td class="version">21.0.2</td><td><a href="/jdk-21.tgz">jdk</a></td></tr>
            <tr><td class="version">17.0.9</td><td><a href="/jdk-17.tgz">jdk</a></td></tr>
          </table>
          <p class="version">outside</p>
        </body></html>
    "#;

    fn module_lua() -> Lua {
        let lua = Lua::new();
        lua.globals().set("html", module(&lua).unwrap()).unwrap();
        lua.globals().set("page", PAGE).unwrap();
        lua
    }

    #[test]
    fn test_module_shape() {
        let lua = module_lua();
        lua.load(
            r#"
            assert(type(html.parse) == "function")
            local doc = html.parse(page)
            assert(type(doc.find) == "function")
            "#,
        )
        .exec()
        .unwrap();
    }

    #[test]
    fn test_find_and_text() {
        let lua = module_lua();
        lua.load(
            r##"
            local doc = html.parse(page)
            assert(#doc:find(".version") == 3)
            assert(doc:find(".version"):first():text() == "21.0.2")
            assert(doc:find("#releases"):find(".version"):text() == "21.0.217.0.9")
            assert(#doc:find("#releases"):find("#releases") == 0)
            assert(#doc:find("span") == 0)
            assert(doc:find("span"):first():text() == "")
            "##,
        )
        .exec()
        .unwrap();
    }

    #[test]
    fn test_html_is_inner_html_of_first() {
        let lua = module_lua();
        lua.load(
            r#"
            local doc = html.parse(page)
            assert(doc:find("tr"):find("td"):html() == "21.0.2")
            assert(doc:find("a"):html() == "jdk")
            assert(doc:find("tr"):first():find("a"):first():html() == "jdk")
            assert(doc:find("span"):html() == "")
            "#,
        )
        .exec()
        .unwrap();
    }

    #[test]
    fn test_invalid_selector() {
        let lua = module_lua();
        let err = lua
            .load(r#"html.parse(page):find("td[")"#)
            .exec()
            .unwrap_err();
        assert!(err.to_string().contains("invalid selector"));
    }
}
