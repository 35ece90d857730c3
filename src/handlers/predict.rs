//! Prediction handlers
//!
//! The async handlers only unpack the request; the work happens in the
//! plain functions below, which take the shared context by reference.

use axum::{extract::State, response::Html, Form, Json};
use serde_json::Value;

use crate::{AppState, AppError, AppResult};
use crate::inference::InferenceContext;
use crate::models::{PredictApiRequest, PredictApiResponse};
use crate::render::{png_data_uri, ForcePlot, LandingPage};

pub const INVALID_INPUT_MESSAGE: &str = "Invalid input. Please enter numeric values.";

/// JSON prediction
pub async fn predict_api(
    State(state): State<AppState>,
    Json(req): Json<PredictApiRequest>,
) -> AppResult<Json<PredictApiResponse>> {
    let response = json_prediction(&state.context, req.data)?;
    Ok(Json(response))
}

/// Form prediction with force plot
pub async fn predict_form(
    State(state): State<AppState>,
    Form(fields): Form<Vec<(String, String)>>,
) -> AppResult<Html<String>> {
    let page = form_prediction(&state.context, &fields)?;
    Ok(Html(page))
}

pub fn json_prediction(ctx: &InferenceContext, data: Option<Value>) -> AppResult<PredictApiResponse> {
    let features = json_features(data)?;
    let prediction = ctx.predict(&features)?;

    tracing::debug!("API prediction {:.4} from {} features", prediction.value, features.len());

    Ok(PredictApiResponse {
        prediction: prediction.value,
        explanation: prediction.contributions,
    })
}

/// Values of the `data` object in insertion order.
fn json_features(data: Option<Value>) -> AppResult<Vec<f64>> {
    let data = match data {
        None | Some(Value::Null) => return Err(AppError::NoData),
        Some(data) => data,
    };

    let object = data
        .as_object()
        .ok_or_else(|| AppError::ValidationError("\"data\" must be an object".to_string()))?;

    object
        .iter()
        .map(|(name, value)| {
            value.as_f64().ok_or_else(|| {
                AppError::ValidationError(format!("Feature \"{}\" is not numeric", name))
            })
        })
        .collect()
}

/// First value of each field, in submission order.
fn form_features(fields: &[(String, String)]) -> Result<Vec<f64>, std::num::ParseFloatError> {
    let mut seen: Vec<&str> = Vec::with_capacity(fields.len());
    let mut values = Vec::with_capacity(fields.len());

    for (name, raw) in fields {
        if seen.contains(&name.as_str()) {
            continue;
        }
        seen.push(name);
        values.push(raw.trim().parse::<f64>()?);
    }

    Ok(values)
}

pub fn form_prediction(ctx: &InferenceContext, fields: &[(String, String)]) -> AppResult<String> {
    let values = match form_features(fields) {
        Ok(values) => values,
        Err(err) => {
            tracing::debug!("Rejected form input: {}", err);
            return Ok(LandingPage {
                feature_names: ctx.feature_names(),
                prediction_text: Some(INVALID_INPUT_MESSAGE.to_string()),
                plot_uri: None,
            }
            .render());
        }
    };

    let prediction = ctx.predict(&values)?;

    let labels: Vec<String> = ctx
        .feature_names()
        .iter()
        .zip(&values)
        .map(|(name, value)| format!("{} = {}", name, value))
        .collect();

    let png = ForcePlot {
        base_value: prediction.expected_value,
        output_value: prediction.margin,
        contributions: &prediction.contributions,
        labels: &labels,
    }
    .render_png()?;

    tracing::debug!("Form prediction {:.4}, plot {} bytes", prediction.value, png.len());

    Ok(LandingPage {
        feature_names: ctx.feature_names(),
        prediction_text: Some(format!("The shear capacity is {:.2} KN", prediction.value)),
        plot_uri: Some(png_data_uri(&png)),
    }
    .render())
}
