/// Resolves the default slot name of a callable from its type name.
///
/// A function item `my_crate::math::fib` resolves to `fib`. Closures have no name of
/// their own and resolve to `{{closure}}`, so every closure after the first needs an
/// explicit name.
pub(crate) fn callable_name<F>() -> String {
    let full = std::any::type_name::<F>();
    let path = match full.find('<') {
        Some(generics) => &full[..generics],
        None => full,
    };
    path.rsplit("::").next().unwrap_or(path).to_owned()
}
