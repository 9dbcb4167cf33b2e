fn classify(n: i32) -> &'static str {
    let label;
    if n < 0 {
        label = "negative";
    } else if n == 0 {
        label = "zero";
    } else {
        label = "positive";
    }
    label
}
