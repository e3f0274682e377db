/// Ranks `candidates` by Levenshtein distance to `name`.
///
/// Keeps at most three names whose distance is below
/// `max(3, name_length / 2)`, closest first, ties broken alphabetically.
pub fn suggest<'a>(name: &str, candidates: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let threshold = 3.max(name.chars().count() / 2);

    let mut ranked: Vec<(usize, &str)> = candidates
        .into_iter()
        .filter(|candidate| *candidate != name)
        .map(|candidate| (strsim::levenshtein(name, candidate), candidate))
        .filter(|(distance, _)| *distance < threshold)
        .collect();

    ranked.sort();
    ranked.dedup();
    ranked
        .into_iter()
        .take(3)
        .map(|(_, candidate)| candidate.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closest_names_first() {
        let names = ["sum", "min", "max", "median", "moving_average"];
        assert_eq!(suggest("sun", names), vec!["sum", "min"]);
    }

    #[test]
    fn distant_names_are_dropped() {
        // "totalSum" is 6 edits from "sum"; the threshold for an 8-char name is 4.
        assert!(suggest("totalSum", ["sum", "count"]).is_empty());
    }

    #[test]
    fn at_most_three() {
        let names = ["ab", "ac", "ad", "ae"];
        assert_eq!(suggest("aa", names).len(), 3);
    }
}
