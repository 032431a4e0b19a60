/*!
Village-level record linkage for the results of the 2025 Taiwanese recall
votes.

The recall results are published per polling station, with district and
village names spelled as the local election commission writes them. This
crate groups them by village, gives each village its official code
(VILLCODE), joins the villages with the results of the previous
legislative election and measures how far each winner stands from the
recall tallies.

Nothing in this crate reads or writes files: the `cunli` program does the
I/O. See the [manual] for the details of each step.

```
use cunli_linkage::*;

let rules = LinkageRules::recall_2025();
let registry = CodeRegistry::from_codes(
    vec![VillageCode {
        code: "63000050001".to_string(),
        county_code: "63000".to_string(),
        district_code: "63000050".to_string(),
        county_name: "臺北市".to_string(),
        district_name: "中正區".to_string(),
        village_name: "建國里".to_string(),
    }],
    &rules,
);
let resolver = Resolver::new(&rules, &registry, &[])?;
let res = resolver.resolve(
    &CunliKey::new("中正區", "建國里"),
    "第11屆立法委員(臺北市第8選舉區)賴士葆罷免案",
);
assert_eq!(res.code().map(|c| c.code.as_str()), Some("63000050001"));
# Ok::<(), LinkageError>(())
```
*/

mod aggregate;
mod config;
mod gaps;
mod join;
pub mod manual;
mod normalize;
mod resolve;

pub use crate::aggregate::*;
pub use crate::config::*;
pub use crate::gaps::*;
pub use crate::join::*;
pub use crate::normalize::*;
pub use crate::resolve::*;
