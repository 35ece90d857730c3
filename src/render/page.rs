//! Landing page rendering

const HOME_TEMPLATE: &str = include_str!("../../templates/home.html");

/// Everything the landing page can show
#[derive(Debug, Clone, Default)]
pub struct LandingPage<'a> {
    pub feature_names: &'a [String],
    pub prediction_text: Option<String>,
    pub plot_uri: Option<String>,
}

impl LandingPage<'_> {
    pub fn render(&self) -> String {
        let inputs: String = self
            .feature_names
            .iter()
            .map(|name| {
                let name = escape_html(name);
                format!(
                    "    <label for=\"{name}\">{name}</label>\n    <input id=\"{name}\" name=\"{name}\" type=\"text\" inputmode=\"decimal\" required>\n"
                )
            })
            .collect();

        let prediction = self
            .prediction_text
            .as_deref()
            .map(|text| format!("  <p class=\"prediction\">{}</p>", escape_html(text)))
            .unwrap_or_default();

        let plot = self
            .plot_uri
            .as_deref()
            .map(|uri| {
                format!(
                    "  <div class=\"explanation\"><img src=\"{}\" alt=\"SHAP force plot\"></div>",
                    escape_html(uri)
                )
            })
            .unwrap_or_default();

        HOME_TEMPLATE
            .replace("{{feature_inputs}}\n", &inputs)
            .replace("{{prediction_block}}", &prediction)
            .replace("{{plot_block}}", &plot)
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
