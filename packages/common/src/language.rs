/// Display names for tracks whose id does not capitalise cleanly.
const TRACK_NAMES: &[(&str, &str)] = &[
    ("cpp", "C++"),
    ("csharp", "C#"),
    ("fsharp", "F#"),
    ("ecmascript", "ECMAScript"),
    ("javascript", "JavaScript"),
    ("typescript", "TypeScript"),
    ("coffeescript", "CoffeeScript"),
    ("objective-c", "Objective-C"),
    ("ocaml", "OCaml"),
    ("php", "PHP"),
    ("plsql", "PL/SQL"),
    ("vbnet", "VB.NET"),
];

/// Human-readable name of a track (language) id, matched case-insensitively.
pub fn of(track_id: &str) -> String {
    let id = track_id.trim().to_ascii_lowercase();
    TRACK_NAMES
        .iter()
        .find(|(track, _)| *track == id)
        .map(|(_, name)| (*name).to_string())
        .unwrap_or_else(|| capitalize(&id))
}

/// Human-readable name of an exercise slug: `"two-fer"` becomes `"Two Fer"`.
pub fn problem_name(slug: &str) -> String {
    slug.split(['-', '_'])
        .filter(|word| !word.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
