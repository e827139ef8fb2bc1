/// Format an integer amount of base units (satoshi, wei, ...) as an exact
/// decimal string with `decimals` fractional digits.
pub fn format_token_amount(amount: u128, decimals: u32) -> String {
    if decimals == 0 {
        return amount.to_string();
    }
    let scale = 10u128.pow(decimals);
    format!(
        "{}.{:0width$}",
        amount / scale,
        amount % scale,
        width = decimals as usize
    )
}
