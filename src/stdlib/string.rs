//! `string.*` builtins. All of them map over the elements of their first
//! argument, so extracted columns can be transformed in one call.

use crate::error::RuntimeError;
use crate::interpreter::{EvalContext, Scalar};
use crate::stdlib::{require_args, text_arg};

pub fn replace(
    _ctx: &mut EvalContext,
    args: Vec<Vec<Scalar>>,
) -> Result<Vec<Scalar>, RuntimeError> {
    require_args("string.replace", &args, 3)?;
    let search = text_arg(&args, 1);
    let replacement = text_arg(&args, 2);
    Ok(args[0]
        .iter()
        .map(|item| Scalar::Text(item.to_text().replace(&search, &replacement)))
        .collect())
}

pub fn tolower(
    _ctx: &mut EvalContext,
    args: Vec<Vec<Scalar>>,
) -> Result<Vec<Scalar>, RuntimeError> {
    require_args("string.tolower", &args, 1)?;
    Ok(args[0]
        .iter()
        .map(|item| Scalar::Text(item.to_text().to_lowercase()))
        .collect())
}

pub fn toupper(
    _ctx: &mut EvalContext,
    args: Vec<Vec<Scalar>>,
) -> Result<Vec<Scalar>, RuntimeError> {
    require_args("string.toupper", &args, 1)?;
    Ok(args[0]
        .iter()
        .map(|item| Scalar::Text(item.to_text().to_uppercase()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::Scope;

    fn ctx() -> EvalContext<'static> {
        EvalContext::new(Scope::new(), None)
    }

    #[test]
    fn replace_maps_over_every_element() {
        let out = replace(
            &mut ctx(),
            vec![
                vec![
                    Scalar::Text("Fa0/1".to_string()),
                    Scalar::Text("Fa0/2".to_string()),
                ],
                vec![Scalar::Text("Fa".to_string())],
                vec![Scalar::Text("FastEthernet".to_string())],
            ],
        )
        .unwrap();
        assert_eq!(
            out,
            vec![
                Scalar::Text("FastEthernet0/1".to_string()),
                Scalar::Text("FastEthernet0/2".to_string()),
            ]
        );
    }

    #[test]
    fn case_changes_keep_list_shape() {
        let out = toupper(&mut ctx(), vec![vec![Scalar::Text("up".to_string())]]).unwrap();
        assert_eq!(out, vec![Scalar::Text("UP".to_string())]);
    }
}
