//! HCL templates in document strings
//!
//! Every string of a document is an HCL template evaluated against the resolved values:
//! - each top level key of the values is a variable: `${image.tag}`, `${ports[0]}`
//! - `${release}` is the release id, it shadows a `release` key of the values
//! - `$${` and `%%{` produce a literal `${` and `%{`
//!
//! A string consisting of exactly one interpolation is replaced by the value itself (keeping its
//! type). Interpolations embedded in text must evaluate to scalars. Keys are never touched.
use crate::mixer::MixerError;
use crate::release::ReleaseId;
use crate::tree::{Document, ValueTree};
use crate::value::{Mapping, Value};
use hcl::eval::{Context, ErrorKind, Evaluate};
use hcl::template::Element;
use hcl::{Expression, Identifier, Template};

const RELEASE: &str = "release";

pub(crate) fn document(
    document: &Document,
    values: &ValueTree,
    release: &ReleaseId,
) -> Result<Document, MixerError> {
    let context = context(values, release);

    let mapping = document
        .as_mapping()
        .iter()
        .map(|(key, value)| Ok((key.clone(), interpolate(value, &context)?)))
        .collect::<Result<Mapping, MixerError>>()?;

    Ok(mapping.into())
}

fn context(values: &ValueTree, release: &ReleaseId) -> Context<'static> {
    let mut context = Context::new();

    for (key, value) in values.as_mapping() {
        match Identifier::new(key.to_string()) {
            Ok(name) => context.declare_var(name, hcl::Value::from(value)),
            Err(_) => tracing::trace!(%key, "not an identifier, no variable declared"),
        }
    }
    context.declare_var(RELEASE, release.as_str());

    context
}

fn interpolate(value: &Value, context: &Context<'_>) -> Result<Value, MixerError> {
    match value {
        Value::String(s) => string(s, context),
        Value::Array(array) => Ok(Value::Array(
            array
                .iter()
                .map(|element| interpolate(element, context))
                .collect::<Result<_, _>>()?,
        )),
        Value::Object(object) => Ok(Value::Object(
            object
                .iter()
                .map(|(key, value)| Ok((key.clone(), interpolate(value, context)?)))
                .collect::<Result<_, MixerError>>()?,
        )),
        scalar => Ok(scalar.clone()),
    }
}

fn string(text: &str, context: &Context<'_>) -> Result<Value, MixerError> {
    if !text.contains("${") && !text.contains("%{") {
        return Ok(Value::String(text.to_string()));
    }

    let template = text.parse::<Template>().map_err(|err| MixerError::Template {
        text: text.to_string(),
        reason: err.to_string(),
    })?;

    if let [Element::Interpolation(interpolation)] = template.elements() {
        return evaluate(&interpolation.expr, context);
    }

    for element in template.elements() {
        if let Element::Interpolation(interpolation) = element {
            let value = evaluate(&interpolation.expr, context)?;
            if !value.is_scalar() {
                return Err(MixerError::NotInterpolable {
                    path: interpolation.expr.to_string(),
                    kind: value.kind(),
                });
            }
        }
    }

    template
        .evaluate(context)
        .map(Value::String)
        .map_err(|err| MixerError::Template {
            text: text.to_string(),
            reason: err.to_string(),
        })
}

fn evaluate(expr: &Expression, context: &Context<'_>) -> Result<Value, MixerError> {
    let value = expr.evaluate(context).map_err(|err| match err.kind() {
        ErrorKind::UndefinedVar(_) | ErrorKind::NoSuchKey(_) | ErrorKind::Index(_) => {
            MixerError::UndefinedValue(expr.to_string())
        }
        _ => MixerError::Template {
            text: expr.to_string(),
            reason: err.to_string(),
        },
    })?;

    Value::try_from(value).map_err(|err| MixerError::Template {
        text: expr.to_string(),
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tree;
    use pretty_assertions::assert_eq;

    fn interpolate(doc: &str) -> Result<Document, MixerError> {
        let values = tree!("app: web\nport: 8080\nlabels: {tier: front}\nports: [80, 443]");
        document(&tree!(doc), &values, &ReleaseId::from("prod"))
    }

    #[test]
    fn whole_placeholder_keeps_type() {
        assert_eq!(
            interpolate("port: ${port}\nlabels: '${labels}'\nsecond: '${ports[1]}'").unwrap(),
            tree!("port: 8080\nlabels: {tier: front}\nsecond: 443")
        );
    }

    #[test]
    fn embedded_placeholders() {
        assert_eq!(
            interpolate("name: '${release}-${app}'\nurl: 'http://${app}:${ port }/'").unwrap(),
            tree!("name: prod-web\nurl: 'http://web:8080/'")
        );
    }

    #[test]
    fn nested_structures_and_keys() {
        assert_eq!(
            interpolate("'${app}': [{name: '${labels.tier}'}, plain]").unwrap(),
            tree!("'${app}': [{name: front}, plain]")
        );
    }

    #[test]
    fn escaped_placeholders_stay_literal() {
        assert_eq!(
            interpolate("cmd: 'echo $${HOME} for ${app}'\nraw: '$${release}'").unwrap(),
            tree!("cmd: 'echo ${HOME} for web'\nraw: '${release}'")
        );
    }

    #[test]
    fn release_shadows_values() {
        let values = tree!("release: from-values");
        assert_eq!(
            document(&tree!("name: '${release}'"), &values, &ReleaseId::from("prod")).unwrap(),
            tree!("name: prod")
        );
    }

    #[test]
    fn errors() {
        assert_eq!(
            interpolate("a: '${missing}'"),
            Err(MixerError::UndefinedValue("missing".to_string()))
        );
        assert_eq!(
            interpolate("a: 'x ${labels.nope}'"),
            Err(MixerError::UndefinedValue("labels.nope".to_string()))
        );
        assert_eq!(
            interpolate("a: 'ports: ${ports}'"),
            Err(MixerError::NotInterpolable {
                path: "ports".to_string(),
                kind: "array"
            })
        );
        assert!(matches!(
            interpolate("a: 'x-${app}-${oops'"),
            Err(MixerError::Template { .. })
        ));
    }
}
