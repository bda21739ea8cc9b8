//! Paginators from the `paginated` trait

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{CodegenError, Result};
use crate::model::{traits, Model, Shape, ShapeId, ShapeType};

/// Resolved pagination configuration of one operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Paginator {
    /// Input member receiving the continuation token
    pub input_token: String,
    /// Output member path holding the next token (`a.b` for nested members)
    pub output_token: Vec<String>,
    /// Output member path of the paged items
    pub items: Option<Vec<String>>,
    /// Input member limiting the page size
    pub page_size: Option<String>,
    /// Target of the final `items` member (a list or map)
    pub items_target: Option<ShapeId>,
}

/// Merge the service and operation `paginated` traits and check every
/// member they name.
pub fn resolve(model: &Model, service: &Shape, operation: &Shape) -> Result<Option<Paginator>> {
    let Some(Value::Object(own)) = operation.traits.get(traits::PAGINATED) else {
        return Ok(None);
    };
    let mut merged: Map<String, Value> = match service.traits.get(traits::PAGINATED) {
        Some(Value::Object(defaults)) => defaults.clone(),
        _ => Map::new(),
    };
    for (key, value) in own {
        merged.insert(key.clone(), value.clone());
    }

    let field = |name: &str| merged.get(name).and_then(Value::as_str).map(str::to_string);
    let invalid = |message: String| CodegenError::validation(format!("{}: paginated: {}", operation.id, message));

    let input = operation
        .input
        .as_ref()
        .map(|id| model.expect_shape(id))
        .transpose()?
        .filter(|s| !s.is_unit());
    let output = operation
        .output
        .as_ref()
        .map(|id| model.expect_shape(id))
        .transpose()?
        .filter(|s| !s.is_unit());
    let (Some(input), Some(output)) = (input, output) else {
        return Err(invalid("paginated operations need input and output structures".to_string()));
    };

    let input_token = field("inputToken").ok_or_else(|| invalid("missing inputToken".to_string()))?;
    let output_token = field("outputToken").ok_or_else(|| invalid("missing outputToken".to_string()))?;

    let input_target = resolve_path(model, input, &[input_token.clone()]).map_err(invalid)?;
    if input_target.shape_type != ShapeType::String {
        return Err(invalid(format!("inputToken `{}` must target a string", input_token)));
    }

    let output_token: Vec<String> = output_token.split('.').map(str::to_string).collect();
    let output_target = resolve_path(model, output, &output_token).map_err(invalid)?;
    if output_target.shape_type != ShapeType::String {
        return Err(invalid(format!("outputToken `{}` must target a string", output_token.join("."))));
    }

    let page_size = field("pageSize");
    if let Some(page_size) = &page_size {
        let target = resolve_path(model, input, &[page_size.clone()]).map_err(invalid)?;
        if !matches!(
            target.shape_type,
            ShapeType::Byte | ShapeType::Short | ShapeType::Integer | ShapeType::Long
        ) {
            return Err(invalid(format!("pageSize `{}` must target an integer", page_size)));
        }
    }

    let items: Option<Vec<String>> = field("items").map(|path| path.split('.').map(str::to_string).collect());
    let items_target = match &items {
        Some(path) => {
            let target = resolve_path(model, output, path).map_err(invalid)?;
            if !matches!(target.shape_type, ShapeType::List | ShapeType::Set | ShapeType::Map) {
                return Err(invalid(format!("items `{}` must target a list or map", path.join("."))));
            }
            Some(target.id.clone())
        }
        None => None,
    };

    Ok(Some(Paginator {
        input_token,
        output_token,
        items,
        page_size,
        items_target,
    }))
}

/// Walk a member path through nested structures
fn resolve_path<'m>(model: &'m Model, start: &'m Shape, path: &[String]) -> std::result::Result<&'m Shape, String> {
    let mut current = start;
    for name in path {
        if current.shape_type != ShapeType::Structure {
            return Err(format!("`{}` is not a member of a structure", name));
        }
        let member = current
            .member(name)
            .ok_or_else(|| format!("{} has no member `{}`", current.id, name))?;
        current = model.target(member).map_err(|e| e.to_string())?;
    }
    Ok(current)
}
