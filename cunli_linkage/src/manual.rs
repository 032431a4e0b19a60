/*!

This is the long-form manual for `cunli_linkage` and the `cunli` program.

## Inputs

### Recall spreadsheets

One Excel (.xlsx) file per recall case, as published by the Central
Election Commission. The name of the file, without the `表5-` prefix,
is the label of the recall case, for example
`第11屆立法委員(臺北市第3選舉區)王鴻薇罷免案各投開票所投開票結果表`.

Only the first worksheet is read. The header row is the first row among
the first 10 rows whose first cell is `行政區別`. The data starts 5 rows
below it. A row with a name in the first column and nothing in the second
one starts a new district. A row with a village and a polling station is a
record:

| column | content                       |
|--------|-------------------------------|
| 1      | village                       |
| 2      | polling station               |
| 3      | agree votes                   |
| 4      | disagree votes                |
| 5      | valid votes                   |
| 6      | invalid votes                 |
| 7      | voters                        |
| 8      | ballots not cast              |
| 9      | ballots issued                |
| 10     | unused ballots                |
| 11     | eligible voters               |
| 12     | turnout (`%` suffix allowed)  |

Empty numeric cells count as 0. A row with a number that cannot be read is
skipped. A file without the header row gives a warning and no records.

### Reference registry

The village boundaries GeoJSON file (`basecode`), of which only the
properties of the features are read:

```text
{"features": [{"properties": {"VILLCODE": "63000050001", "COUNTYCODE": "63000",
  "TOWNCODE": "63000050", "COUNTYNAME": "臺北市", "TOWNNAME": "中正區",
  "VILLNAME": "建國里"}}]}
```

Each village is registered under its exact names and under the three
spellings obtained by replacing `臺` with `台` in the county, the
district, or both. The exact spelling wins when two villages compete for
the same key.

### Manual overrides

A JSON array, maintained by hand. Entries with an empty `villcode` are
ignored: they are the villages still waiting for a decision. `villcode`
may be a list when the village was split or merged; the first code is
then the one used to name the village.

```text
[{"cunli_key": "永和區_光復里", "district": "永和區", "village": "光復里",
  "county": "新北市", "villcode": "65000040036", "note": "checked"}]
```

After every `extract` run, the file is rewritten: the filled entries are
kept as they are, and a blank entry is appended for every village that
still has no code.

### Election results

A JSON object keyed by village code, with the results of the 2024
legislative election:

```text
{"63000050001": {"name": "臺北市中正區建國里", "zone": "臺北市第08選區",
  "zoneCode": "...", "total": 1000, "votes_all": 2000,
  "votes": {"1": {"name": "A", "party": "中國國民黨", "votes": 600, "no": "1"}}}}
```

## Processing

1. **Extraction** reads the spreadsheets into polling records.
2. **Normalization** maps the four county names written with `臺` that
   the registry writes with `台` (`臺北市`, `臺中市`, `臺東縣`,
   `臺南市`). Other names are left alone. The county of a village is read
   from the label of its recall case.
3. **Resolution** looks for a manual override, then for the registry key.
   A village that has a code keeps it: resolving again never replaces it.
4. **Aggregation** groups the records by their district and village names,
   sums the tallies and computes the turnout, rounded to 2 decimals (0.0
   when there are no eligible voters).
5. **Correction**: the agree and disagree votes of 新北市永和區光復里
   (65000040036) were swapped in the published spreadsheets. They are
   swapped back, once, in the sums and in every record.
6. **Join**: the location names of the election results are split into
   county, district and village and matched with the resolved villages.
   When a village voted in several recall cases, the records of the case
   matching the election zone are used:
   - 新竹市: the case of 鄭正鈐 (the mayor case is left out),
   - 基隆市: the case of the `基隆市選舉區`,
   - 臺北市: the case whose label carries the zone number (1 to 8).

   Entries whose name cannot be split, such as villages of county-level
   cities (`花蓮縣花蓮市…`), are skipped.
7. **Gaps**: the winner of each village is the candidate with the most
   votes, the first in ballot order on a tie. For winners of the
   incumbent party (`中國國民黨`) the gap is the winner's votes minus the
   disagree votes. For everyone else it is the winner's votes minus the
   agree votes.

## Configuration

The program accepts a JSON configuration file (`--config`). All the
fields are optional, and the command line overrides them.

| field                 | default                          |
|-----------------------|----------------------------------|
| `rawDirectory`        | `raw`                            |
| `basecodePath`        | none, required to resolve codes  |
| `manualMappingPath`   | `missing_villcode_mapping.json`  |
| `outputDirectory`     | `docs/cunli_json`                |
| `electionPath`        | none, required to combine        |
| `combinedCsvPath`     | `cunli_combined_results.csv`     |
| `incumbentGapCsvPath` | `kmt_winners_vote_gaps.csv`      |
| `otherGapCsvPath`     | `non_kmt_winners_vote_gaps.csv`  |
| `incumbentParty`      | `中國國民黨`                       |
| `spreadsheetPrefix`   | `表5-`                           |

The linkage constants themselves (variants, corrections, zone rules) are
held by [crate::LinkageRules].

 */
